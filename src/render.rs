//! Markup rendering from resolved variants and per-breakpoint templates.
//!
//! Templates are plain strings with `{token}` placeholders:
//!
//! | Token | Value |
//! |-------|-------|
//! | `{src}` | absolute URL of the resolved variant |
//! | `{alt}` | alt text |
//! | `{title}` | title text |
//! | `{w}` | variant width in pixels |
//! | `{h}` | variant height in pixels |
//!
//! Substitution is a single left-to-right pass: substituted values are
//! never scanned for tokens again, and unknown `{...}` sequences are left
//! alone. In `<picture>` and background markup the substituted values are
//! HTML-escaped; `srcset`/`sizes` fragments are joined into one attribute
//! and escaped as a whole by [maud](https://maud.lambda.xyz/).
//!
//! Every renderer prefixes its output with one `<!-- ... -->` comment per
//! resolution warning, including when nothing else is rendered.

use crate::registry::{BreakpointOption, ResponsiveSet};
use crate::resolve::{Resolution, ResolvedVariant, Warning};
use maud::{PreEscaped, html};

/// Used for a breakpoint without its own `<picture>` template when it is
/// the only breakpoint in its set.
pub const DEFAULT_PICTURE_TEMPLATE: &str = r#"<img srcset="{src}" alt="{alt}" title="{title}">"#;

/// Attributes applied to the rendered markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PictureAttributes {
    pub class: String,
    pub alt: String,
    pub title: String,
}

impl PictureAttributes {
    /// Default attributes for a set: `attachment-<set> size-<set> rwd-picture`.
    pub fn for_size(set_key: &str) -> Self {
        Self {
            class: format!("attachment-{set_key} size-{set_key} rwd-picture"),
            ..Self::default()
        }
    }
}

/// Replace `{token}` placeholders in one pass.
pub fn substitute(template: &str, tokens: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match tokens.iter().find(|(token, _)| rest.starts_with(token)) {
            Some((token, value)) => {
                out.push_str(value);
                rest = &rest[token.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape(value: &str) -> String {
    html! { (value) }.into_string()
}

/// Token values for one variant; escaped for direct insertion into markup
/// when `escaped` is set.
fn token_values(
    variant: &ResolvedVariant,
    attrs: &PictureAttributes,
    escaped: bool,
) -> [(&'static str, String); 5] {
    let text = |s: &str| if escaped { escape(s) } else { s.to_string() };
    [
        ("{src}", text(&variant.url)),
        ("{alt}", text(&attrs.alt)),
        ("{title}", text(&attrs.title)),
        ("{w}", variant.width.to_string()),
        ("{h}", variant.height.to_string()),
    ]
}

fn apply(template: &str, variant: &ResolvedVariant, attrs: &PictureAttributes, escaped: bool) -> String {
    let values = token_values(variant, attrs, escaped);
    let tokens: Vec<(&str, &str)> = values.iter().map(|(t, v)| (*t, v.as_str())).collect();
    substitute(template, &tokens)
}

/// Breakpoints of `set` that resolved, in set order, with their variants.
fn resolved_breakpoints<'a>(
    resolution: &'a Resolution,
    set: &'a ResponsiveSet,
) -> impl Iterator<Item = (&'a BreakpointOption, &'a ResolvedVariant)> + 'a {
    set.breakpoints()
        .iter()
        .filter_map(move |option| resolution.get(&option.key).map(|variant| (option, variant)))
}

/// One HTML comment per warning, each on its own line.
pub fn warnings_comment(warnings: &[Warning]) -> String {
    warnings
        .iter()
        .map(|w| format!("<!-- {} -->\n", comment_text(w.message())))
        .collect()
}

/// Break up every `--` so the text cannot end its comment.
fn comment_text(message: &str) -> String {
    let mut text = message.to_string();
    while text.contains("--") {
        text = text.replace("--", "- -");
    }
    text
}

fn picture_template(option: &BreakpointOption, set_len: usize) -> Option<&str> {
    match option.templates.picture.as_deref() {
        Some("") => Some(DEFAULT_PICTURE_TEMPLATE),
        Some(template) => Some(template),
        None if set_len == 1 => Some(DEFAULT_PICTURE_TEMPLATE),
        None => None,
    }
}

/// Render a `<picture>` element, one line per breakpoint with a template.
///
/// An empty resolution renders as its warning comments only.
pub fn render_picture(resolution: &Resolution, set: &ResponsiveSet, attrs: &PictureAttributes) -> String {
    let comments = warnings_comment(&resolution.warnings);
    if resolution.is_empty() {
        return comments;
    }

    let mut body = String::from("\n");
    for (option, variant) in resolved_breakpoints(resolution, set) {
        if let Some(template) = picture_template(option, set.len()) {
            body.push_str(&apply(template, variant, attrs, true));
            body.push('\n');
        }
    }
    let picture = html! {
        picture class=(attrs.class) { (PreEscaped(body)) }
    };
    format!("{comments}{}", picture.into_string())
}

/// Render background rules, one line per breakpoint with a background
/// template.
pub fn render_background(
    resolution: &Resolution,
    set: &ResponsiveSet,
    attrs: &PictureAttributes,
) -> String {
    let comments = warnings_comment(&resolution.warnings);
    let rules: Vec<String> = resolved_breakpoints(resolution, set)
        .filter_map(|(option, variant)| {
            let template = option.templates.background.as_deref()?;
            Some(apply(template, variant, attrs, true))
        })
        .collect();
    if rules.is_empty() {
        return comments;
    }
    format!("{comments}{}", rules.join("\n"))
}

/// Render a single `<img>` whose `srcset` and `sizes` are assembled from
/// the breakpoints' fragment templates.
///
/// Renders nothing but warnings when no resolved breakpoint has a `srcset`
/// fragment.
pub fn render_img(resolution: &Resolution, set: &ResponsiveSet, attrs: &PictureAttributes) -> String {
    let comments = warnings_comment(&resolution.warnings);
    let mut srcset = Vec::new();
    let mut sizes = Vec::new();
    for (option, variant) in resolved_breakpoints(resolution, set) {
        if let Some(template) = option.templates.srcset.as_deref() {
            srcset.push(apply(template, variant, attrs, false));
        }
        if let Some(template) = option.templates.sizes.as_deref() {
            sizes.push(apply(template, variant, attrs, false));
        }
    }
    if srcset.is_empty() {
        return comments;
    }

    let sizes = (!sizes.is_empty()).then(|| sizes.join(", "));
    let img = html! {
        img class=(attrs.class) srcset=(srcset.join(", ")) sizes=[sizes] alt=(attrs.alt) title=(attrs.title);
    };
    format!("{comments}{}", img.into_string())
}

/// Strip HTML tags from a string (simple angle-bracket stripping).
pub fn strip_tags(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{SizeRegistry, Templates};
    use crate::test_helpers::hero_registry;

    fn variant(key: &str, width: u32) -> ResolvedVariant {
        ResolvedVariant {
            breakpoint_key: key.to_string(),
            width,
            height: width * 3 / 4,
            source_image_id: 1,
            url: format!("http://example.com/uploads/photo-{key}.jpg"),
        }
    }

    fn attrs() -> PictureAttributes {
        PictureAttributes {
            class: "hero-pic".to_string(),
            alt: "Dawn".to_string(),
            title: "Lake".to_string(),
        }
    }

    fn both() -> Resolution {
        Resolution {
            variants: vec![variant("mobile", 400), variant("desktop", 1200)],
            warnings: vec![],
        }
    }

    // =========================================================================
    // substitute
    // =========================================================================

    #[test]
    fn substitute_replaces_all_tokens() {
        let out = substitute("{src} {w}w {src}", &[("{src}", "a.jpg"), ("{w}", "400")]);
        assert_eq!(out, "a.jpg 400w a.jpg");
    }

    #[test]
    fn substitute_is_single_pass() {
        let out = substitute("{alt}", &[("{alt}", "{src}"), ("{src}", "x")]);
        assert_eq!(out, "{src}");
    }

    #[test]
    fn substitute_leaves_unknown_braces() {
        let out = substitute("a { {w} {nope} }", &[("{w}", "1")]);
        assert_eq!(out, "a { 1 {nope} }");
    }

    #[test]
    fn substitute_handles_multibyte_text() {
        let out = substitute("é{w}ü{", &[("{w}", "9")]);
        assert_eq!(out, "é9ü{");
    }

    // =========================================================================
    // render_picture
    // =========================================================================

    #[test]
    fn picture_renders_one_line_per_breakpoint() {
        let registry = hero_registry();
        let set = registry.find_set("hero").unwrap();
        let html = render_picture(&both(), set, &attrs());
        assert_eq!(
            html,
            "<picture class=\"hero-pic\">\n\
             <source media=\"(max-width: 600px)\" srcset=\"http://example.com/uploads/photo-mobile.jpg\">\n\
             <img srcset=\"http://example.com/uploads/photo-desktop.jpg\" alt=\"Dawn\" title=\"Lake\">\n\
             </picture>"
        );
    }

    #[test]
    fn picture_follows_set_order_not_resolution_order() {
        let registry = hero_registry();
        let set = registry.find_set("hero").unwrap();
        let resolution = Resolution {
            variants: vec![variant("desktop", 1200), variant("mobile", 400)],
            warnings: vec![],
        };
        let html = render_picture(&resolution, set, &attrs());
        assert!(html.find("photo-mobile").unwrap() < html.find("photo-desktop").unwrap());
    }

    #[test]
    fn picture_empty_resolution_is_empty_string() {
        let registry = hero_registry();
        let set = registry.find_set("hero").unwrap();
        assert_eq!(render_picture(&Resolution::default(), set, &attrs()), "");
    }

    #[test]
    fn picture_empty_resolution_keeps_warnings() {
        let registry = hero_registry();
        let set = registry.find_set("hero").unwrap();
        let resolution = Resolution {
            variants: vec![],
            warnings: vec![Warning::new("first"), Warning::new("second")],
        };
        assert_eq!(
            render_picture(&resolution, set, &attrs()),
            "<!-- first -->\n<!-- second -->\n"
        );
    }

    #[test]
    fn picture_warnings_come_first() {
        let registry = hero_registry();
        let set = registry.find_set("hero").unwrap();
        let mut resolution = both();
        resolution.warnings.push(Warning::new("careful"));
        let html = render_picture(&resolution, set, &attrs());
        assert!(html.starts_with("<!-- careful -->\n<picture"));
    }

    #[test]
    fn picture_escapes_attributes_and_tokens() {
        let registry = hero_registry();
        let set = registry.find_set("hero").unwrap();
        let attrs = PictureAttributes {
            class: "a\"b".to_string(),
            alt: "<b>&".to_string(),
            title: String::new(),
        };
        let html = render_picture(&both(), set, &attrs);
        assert!(html.contains("class=\"a&quot;b\""));
        assert!(html.contains("alt=\"&lt;b&gt;&amp;\""));
    }

    #[test]
    fn picture_skips_breakpoints_without_template() {
        let mut registry = SizeRegistry::new();
        registry
            .register_breakpoint("hero", "mobile", &"400x300".into(), Templates::default())
            .unwrap();
        registry
            .register_breakpoint("hero", "desktop", &"1200x900".into(), Templates::picture("<d {w}>"))
            .unwrap();
        let set = registry.find_set("hero").unwrap();
        let html = render_picture(&both(), set, &attrs());
        assert_eq!(html, "<picture class=\"hero-pic\">\n<d 1200>\n</picture>");
    }

    #[test]
    fn single_breakpoint_without_template_uses_default() {
        let mut registry = SizeRegistry::new();
        registry
            .register_breakpoint("solo", "mobile", &"400x300".into(), Templates::default())
            .unwrap();
        let set = registry.find_set("solo").unwrap();
        let resolution = Resolution {
            variants: vec![variant("mobile", 400)],
            warnings: vec![],
        };
        let html = render_picture(&resolution, set, &attrs());
        assert!(html.contains(
            "<img srcset=\"http://example.com/uploads/photo-mobile.jpg\" alt=\"Dawn\" title=\"Lake\">"
        ));
    }

    #[test]
    fn empty_picture_template_uses_default() {
        let mut registry = SizeRegistry::new();
        registry
            .register_breakpoint("hero", "mobile", &"400x300".into(), Templates::picture(""))
            .unwrap();
        registry
            .register_breakpoint("hero", "desktop", &"1200x900".into(), Templates::default())
            .unwrap();
        let set = registry.find_set("hero").unwrap();
        let html = render_picture(&both(), set, &attrs());
        assert!(html.contains("photo-mobile.jpg\" alt=\"Dawn\""));
        assert!(!html.contains("photo-desktop"));
    }

    // =========================================================================
    // render_background / render_img
    // =========================================================================

    #[test]
    fn background_renders_rules_for_templated_breakpoints() {
        let registry = hero_registry();
        let set = registry.find_set("hero").unwrap();
        assert_eq!(
            render_background(&both(), set, &attrs()),
            ".hero { background-image: url(http://example.com/uploads/photo-mobile.jpg); }"
        );
    }

    #[test]
    fn background_empty_resolution_keeps_warnings() {
        let registry = hero_registry();
        let set = registry.find_set("hero").unwrap();
        let resolution = Resolution {
            variants: vec![],
            warnings: vec![Warning::new("w")],
        };
        assert_eq!(render_background(&resolution, set, &attrs()), "<!-- w -->\n");
    }

    #[test]
    fn img_joins_srcset_and_sizes() {
        let registry = hero_registry();
        let set = registry.find_set("hero").unwrap();
        let html = render_img(&both(), set, &attrs());
        assert!(html.starts_with("<img class=\"hero-pic\""));
        assert!(html.contains(
            "srcset=\"http://example.com/uploads/photo-mobile.jpg 400w, http://example.com/uploads/photo-desktop.jpg 1200w\""
        ));
        assert!(html.contains("sizes=\"(max-width: 600px) 100vw, 80vw\""));
        assert!(html.contains("alt=\"Dawn\""));
    }

    #[test]
    fn img_without_sizes_omits_attribute() {
        let mut registry = SizeRegistry::new();
        registry
            .register_breakpoint(
                "hero",
                "mobile",
                &"400x300".into(),
                Templates {
                    srcset: Some("{src} {w}w".to_string()),
                    ..Templates::default()
                },
            )
            .unwrap();
        let set = registry.find_set("hero").unwrap();
        let html = render_img(&both(), set, &attrs());
        assert!(html.contains("srcset="));
        assert!(!html.contains("sizes="));
    }

    #[test]
    fn img_without_srcset_templates_renders_nothing() {
        let mut registry = SizeRegistry::new();
        registry
            .register_breakpoint("hero", "mobile", &"400x300".into(), Templates::default())
            .unwrap();
        let set = registry.find_set("hero").unwrap();
        assert_eq!(render_img(&both(), set, &attrs()), "");
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn warnings_cannot_close_their_comment() {
        let out = warnings_comment(&[Warning::new("bad --> size")]);
        assert_eq!(out, "<!-- bad - -> size -->\n");
    }

    #[test]
    fn runs_of_dashes_are_fully_broken_up() {
        let out = warnings_comment(&[Warning::new("x---><b>")]);
        assert_eq!(out, "<!-- x- - -><b> -->\n");

        let out = warnings_comment(&[Warning::new("a----b")]);
        assert_eq!(out, "<!-- a- - - -b -->\n");
    }

    #[test]
    fn unknown_size_key_cannot_inject_markup() {
        let out = warnings_comment(&[Warning::unknown_size("x---><script>alert(1)</script>")]);
        assert_eq!(out.matches("-->").count(), 1);
        assert!(out.ends_with(" -->\n"));
        assert!(!out.contains("<script>"));
    }

    #[test]
    fn default_attributes_for_size() {
        assert_eq!(
            PictureAttributes::for_size("hero").class,
            "attachment-hero size-hero rwd-picture"
        );
    }

    #[test]
    fn strip_tags_removes_markup() {
        assert_eq!(strip_tags("<b>Dawn</b> lake"), "Dawn lake");
    }
}
