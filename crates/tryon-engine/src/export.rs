use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tryon_contracts::models::TryOnResult;

const EMPTY_GALLERY: &str = "<div class='empty'><h2>Your Gallery is Empty</h2><p>You haven't saved any looks yet. Go to the Try-On Studio to create and save your first outfit!</p></div>";

/// Writes the gallery as a single self-contained HTML page. Images stay
/// inline as data URIs, so the page has no sibling files.
pub fn export_gallery_html(gallery: &[TryOnResult], out_path: &Path) -> Result<()> {
    let html_doc = render_gallery_html(gallery);
    if let Some(parent) = out_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(out_path, html_doc)
        .with_context(|| format!("failed to write {}", out_path.display()))?;
    Ok(())
}

pub fn render_gallery_html(gallery: &[TryOnResult]) -> String {
    let cards = if gallery.is_empty() {
        EMPTY_GALLERY.to_string()
    } else {
        gallery.iter().map(render_card).collect::<Vec<_>>().join("\n    ")
    };
    format!(
        "<!doctype html>\n<html>\n<head>\n  <meta charset='utf-8'>\n  <title>Try-On Gallery</title>\n  <style>\n    body {{ font-family: Arial, sans-serif; background: #111827; color: #e5e7eb; margin: 0; padding: 20px; }}\n    .grid {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(260px, 1fr)); gap: 16px; }}\n    .card {{ background: #1f2937; border-radius: 10px; overflow: hidden; }}\n    .card > img {{ width: 100%; aspect-ratio: 1; object-fit: cover; }}\n    .meta {{ padding: 10px; }}\n    .title {{ font-weight: bold; }}\n    .sub, .saved {{ font-size: 13px; color: #9ca3af; }}\n    .desc {{ font-size: 12px; font-style: italic; }}\n    .clothing {{ display: grid; grid-template-columns: repeat(4, 1fr); gap: 4px; margin-top: 8px; }}\n    .clothing img {{ width: 100%; aspect-ratio: 1; object-fit: cover; }}\n    ul {{ font-size: 12px; padding-left: 16px; }}\n  </style>\n</head>\n<body>\n  <h1>Gallery ({count})</h1>\n  <div class='grid'>\n    {cards}\n  </div>\n</body>\n</html>\n",
        count = gallery.len(),
    )
}

fn render_card(result: &TryOnResult) -> String {
    let details = &result.clothing_details;
    let title = if details.item_type.trim().is_empty() {
        "Clothing Item"
    } else {
        details.item_type.as_str()
    };
    let description = if details.description.trim().is_empty() {
        String::new()
    } else {
        format!("<p class='desc'>\"{}\"</p>", escape_html(&details.description))
    };
    let clothing = result
        .clothing_images
        .iter()
        .enumerate()
        .map(|(idx, image)| {
            format!(
                "<img src='{}' alt='Clothing {}'>",
                escape_html(image.as_str()),
                idx + 1
            )
        })
        .collect::<String>();
    let measurements = result
        .measurements
        .lines("N/A")
        .iter()
        .map(|line| format!("<li>{}</li>", escape_html(line)))
        .collect::<String>();
    format!(
        "<div class='card'><img src='{final_image}' alt='Try-on result'><div class='meta'><div class='title'>{title}</div><div class='sub'>{headline}</div>{description}<div class='clothing'>{clothing}</div><div class='saved'>Saved on: {timestamp}</div><ul>{measurements}</ul></div></div>",
        final_image = escape_html(result.final_image.as_str()),
        title = escape_html(title),
        headline = escape_html(&result.headline()),
        timestamp = escape_html(&result.timestamp),
    )
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}
