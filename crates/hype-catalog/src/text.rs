//! HTML-to-plain-text conversion for catalog descriptions.

use std::sync::LazyLock;

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use regex::{Captures, Regex};

static TAG: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

static BLANK_RUN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline pattern"));

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").expect("valid entity pattern")
});

/// Entities decoded after tags are removed from item pages. `&amp;` comes first, matching the
/// catalog's single level of escaping.
const ENTITIES: &[(&str, &str)] = &[
  ("&amp;", "&"),
  ("&lt;", "<"),
  ("&gt;", ">"),
  ("&quot;", "\""),
  ("&#39;", "'"),
  ("&mdash;", "\u{2014}"),
  ("&ndash;", "\u{2013}"),
  ("&nbsp;", " "),
];

/// Remove markup, decode the common entities, collapse runs of three or more
/// newlines to exactly two, and trim.
pub fn strip_html(html: &str) -> String {
  let mut text = TAG.replace_all(html, "").into_owned();
  for (entity, replacement) in ENTITIES {
    if text.contains(entity) {
      text = text.replace(entity, replacement);
    }
  }
  tidy(&text)
}

/// Like [`strip_html`], but decodes every HTML5 named entity and numeric
/// reference. XML API descriptions arrive with their markup escaped twice,
/// so any entity may survive the XML layer.
pub fn html_to_text(html: &str) -> String {
  let text = TAG.replace_all(html, "");
  let text = ENTITY.replace_all(&text, |caps: &Captures<'_>| {
    let entity = &caps[0];
    // Unknown names are left as written.
    unescape_with(entity, resolve_html5_entity)
      .map_or_else(|_| entity.to_string(), |s| s.into_owned())
  });
  tidy(&text)
}

fn tidy(text: &str) -> String { BLANK_RUN.replace_all(text, "\n\n").trim().to_string() }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_tags_and_entities() {
    let html = "<p>Build <b>trains</b> &amp; tracks&nbsp;&mdash; fast</p>";
    assert_eq!(strip_html(html), "Build trains & tracks \u{2014} fast");
  }

  #[test]
  fn collapses_blank_runs() {
    assert_eq!(strip_html("a\n\n\n\n\nb\n\nc\n"), "a\n\nb\n\nc");
  }

  #[test]
  fn full_decode_resolves_named_and_numeric_references() {
    let html = "It&#039;s a &ldquo;classic&rdquo; game&hellip; caf&eacute; &#x41;&rsquo;";
    assert_eq!(
      html_to_text(html),
      "It's a \u{201C}classic\u{201D} game\u{2026} caf\u{e9} A\u{2019}"
    );
  }

  #[test]
  fn full_decode_keeps_unknown_and_bare_ampersands() {
    assert_eq!(html_to_text("R&D &bogus; <i>x</i>&amp;y"), "R&D &bogus; x&y");
  }

  #[test]
  fn quotes_and_apostrophes() {
    assert_eq!(strip_html("&quot;It&#39;s&quot; &lt;3"), "\"It's\" <3");
  }
}
