//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Sizes
//! 001 hero 1600x900
//! 002 mobile 400x300 (crop)
//! 003 thumb 150x150 (crop)
//! 004 thumb @2x 300x300 (crop)
//!
//! Sets
//! 001 hero (2 breakpoints)
//!     001 mobile 400x300 (crop)
//!         Templates: picture, bg, srcset, sizes
//!     002 desktop 1200x900
//!         Templates: picture
//!
//! Registered 4 sizes, 1 set
//! ```
//!
//! ## Batch
//!
//! ```text
//! 001 hero (image 42, picture)
//!     <picture class="attachment-hero size-hero rwd-picture">
//!     ...
//!     </picture>
//!
//! Rendered 1 request
//! Metadata: 3 cached, 1 fetched (4 total)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cache::CacheStats;
use crate::engine::{RenderFormat, RenderRequest};
use crate::registry::{BreakpointOption, SizeRegistry};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `"1 set"`, `"2 sets"`.
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Names of the templates a breakpoint carries, in config order.
fn template_names(option: &BreakpointOption) -> Vec<&'static str> {
    let t = &option.templates;
    [
        (t.picture.is_some(), "picture"),
        (t.background.is_some(), "bg"),
        (t.srcset.is_some(), "srcset"),
        (t.sizes.is_some(), "sizes"),
    ]
    .into_iter()
    .filter_map(|(present, name)| present.then_some(name))
    .collect()
}

fn format_name(format: RenderFormat) -> &'static str {
    match format {
        RenderFormat::Picture => "picture",
        RenderFormat::Img => "img",
        RenderFormat::Background => "background",
    }
}

// ============================================================================
// check
// ============================================================================

/// Format the registry as a size and set inventory.
pub fn format_check_output(registry: &SizeRegistry) -> Vec<String> {
    let mut lines = Vec::new();
    let sizes = registry.sizes();
    let sets = registry.sets();

    if !sizes.is_empty() {
        lines.push("Sizes".to_string());
        for (i, size) in sizes.iter().enumerate() {
            lines.push(format!("{} {} {}", format_index(i + 1), size.key(), size));
        }
        lines.push(String::new());
    }

    if !sets.is_empty() {
        lines.push("Sets".to_string());
        for (i, set) in sets.iter().enumerate() {
            lines.push(format!(
                "{} {} ({})",
                format_index(i + 1),
                set.key(),
                plural(set.len(), "breakpoint")
            ));
            for (j, option) in set.breakpoints().iter().enumerate() {
                lines.push(format!(
                    "{}{} {} {}",
                    indent(1),
                    format_index(j + 1),
                    option.key,
                    option.size
                ));
                let templates = template_names(option);
                let templates = if templates.is_empty() {
                    "none".to_string()
                } else {
                    templates.join(", ")
                };
                lines.push(format!("{}Templates: {}", indent(2), templates));
            }
        }
        lines.push(String::new());
    }

    lines.push(format!(
        "Registered {}, {}",
        plural(sizes.len(), "size"),
        plural(sets.len(), "set")
    ));
    lines
}

/// Print check output to stdout.
pub fn print_check_output(registry: &SizeRegistry) {
    for line in format_check_output(registry) {
        println!("{}", line);
    }
}

// ============================================================================
// batch
// ============================================================================

/// Format rendered batch results, one block per request, in request order.
///
/// Requests that rendered nothing show `(nothing rendered)`.
pub fn format_batch_output(requests: &[RenderRequest], rendered: &[String]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, (request, markup)) in requests.iter().zip(rendered).enumerate() {
        lines.push(format!(
            "{} {} (image {}, {})",
            format_index(i + 1),
            request.size,
            request.image,
            format_name(request.format)
        ));
        if markup.is_empty() {
            lines.push(format!("{}(nothing rendered)", indent(1)));
        }
        for line in markup.lines() {
            lines.push(format!("{}{}", indent(1), line));
        }
    }
    lines
}

/// Format the closing summary of a batch run.
pub fn format_batch_summary(count: usize, metadata: CacheStats) -> Vec<String> {
    vec![
        format!("Rendered {}", plural(count, "request")),
        format!("Metadata: {}", metadata),
    ]
}

/// Print batch results and summary to stdout.
pub fn print_batch_output(requests: &[RenderRequest], rendered: &[String], metadata: CacheStats) {
    for line in format_batch_output(requests, rendered) {
        println!("{}", line);
    }
    println!();
    for line in format_batch_summary(requests.len(), metadata) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Attributes;
    use crate::media::ImageRef;
    use crate::registry::Templates;
    use crate::resolve::Overrides;
    use crate::test_helpers::hero_registry;

    fn request(size: &str, image: u64, format: RenderFormat) -> RenderRequest {
        RenderRequest {
            size: size.to_string(),
            image: ImageRef::Id(image),
            overrides: Overrides::new(),
            attributes: Attributes::default(),
            format,
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "set"), "1 set");
        assert_eq!(plural(0, "set"), "0 sets");
        assert_eq!(plural(3, "size"), "3 sizes");
    }

    // =========================================================================
    // check
    // =========================================================================

    #[test]
    fn check_lists_sizes_and_sets() {
        let lines = format_check_output(&hero_registry());
        assert_eq!(
            lines,
            vec![
                "Sizes",
                "001 desktop 1200x900",
                "002 mobile 400x300",
                "",
                "Sets",
                "001 hero (2 breakpoints)",
                "    001 mobile 400x300",
                "        Templates: picture, bg, srcset, sizes",
                "    002 desktop 1200x900",
                "        Templates: picture, srcset, sizes",
                "",
                "Registered 2 sizes, 1 set",
            ]
        );
    }

    #[test]
    fn check_shows_crop_and_missing_templates() {
        let mut registry = SizeRegistry::new();
        registry
            .register_breakpoint("card", "square", &"200x200x1".into(), Templates::default())
            .unwrap();
        let lines = format_check_output(&registry);
        assert!(lines.contains(&"001 square 200x200 (crop)".to_string()));
        assert!(lines.contains(&"        Templates: none".to_string()));
        assert_eq!(lines.last().unwrap(), "Registered 1 size, 1 set");
    }

    #[test]
    fn check_empty_registry() {
        let lines = format_check_output(&SizeRegistry::new());
        assert_eq!(lines, vec!["Registered 0 sizes, 0 sets"]);
    }

    // =========================================================================
    // batch
    // =========================================================================

    #[test]
    fn batch_output_indents_markup() {
        let requests = vec![
            request("hero", 42, RenderFormat::Picture),
            request("banner", 7, RenderFormat::Img),
        ];
        let rendered = vec!["<picture>\n<img>\n</picture>".to_string(), String::new()];
        let lines = format_batch_output(&requests, &rendered);
        assert_eq!(
            lines,
            vec![
                "001 hero (image 42, picture)",
                "    <picture>",
                "    <img>",
                "    </picture>",
                "002 banner (image 7, img)",
                "    (nothing rendered)",
            ]
        );
    }

    #[test]
    fn batch_summary_reports_cache_use() {
        let lines = format_batch_summary(3, CacheStats { hits: 5, misses: 2 });
        assert_eq!(lines[0], "Rendered 3 requests");
        assert_eq!(lines[1], "Metadata: 5 cached, 2 fetched (7 total)");
    }
}
