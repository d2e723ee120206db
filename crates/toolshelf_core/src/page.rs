//! Default entry page for newly created tools.

use crate::model::Tool;

/// Escape text for HTML element content and attribute values
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the placeholder `index.html` written into a new tool directory.
///
/// The page is static: the tool's name as title and heading, its description,
/// and a short note that the page is waiting for content.
#[must_use]
pub fn render_entry_page(tool: &Tool) -> String {
    let name = escape_html(&tool.name);
    let description = escape_html(&tool.description);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{name}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background-color: #f5f7fa;
        }}
        .container {{
            max-width: 800px;
            margin: 0 auto;
            background: white;
            padding: 30px;
            border-radius: 8px;
            box-shadow: 0 2px 10px rgba(0,0,0,0.1);
        }}
        h1 {{
            color: #303133;
        }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{name}</h1>
        <p>{description}</p>
        <p>This tool page was just created. Add its functionality here.</p>
    </div>
</body>
</html>
"#
    )
}
