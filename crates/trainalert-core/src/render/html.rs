//! HTML e-mail template

const STYLE: &str = r#"
      body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; background-color: #f5f5f5; padding: 20px; }
      .container { background-color: white; border-radius: 8px; padding: 30px; max-width: 800px; margin: 0 auto; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
      h2 { color: #2c3e50; border-bottom: 2px solid #3498db; padding-bottom: 10px; }
      .content { color: #34495e; line-height: 1.6; font-family: 'Courier New', monospace; background-color: #f8f9fa; padding: 15px; border-radius: 5px; margin: 20px 0; }
      .footer { margin-top: 30px; padding-top: 20px; border-top: 1px solid #ddd; color: #7f8c8d; font-size: 0.85em; text-align: center; }
"#;

/// Wrap a plain-text body in the notification e-mail layout
pub fn html_email(subject: &str, body: &str, has_attachments: bool) -> String {
    let content = escape(body).replace('\n', "<br>\n");
    let attachments = if has_attachments {
        "\n    <p><em>Metric history is attached to this email.</em></p>"
    } else {
        ""
    };

    format!(
        r#"<html>
  <head>
    <meta charset="utf-8">
    <style>{STYLE}    </style>
  </head>
  <body>
    <div class="container">
    <h2>{subject}</h2>
    <div class="content">
{content}
    </div>{attachments}
    <div class="footer">Sent by TrainAlert - ML Training Notification System</div>
    </div>
  </body>
</html>
"#,
        subject = escape(subject),
    )
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_is_escaped_and_line_broken() {
        let html = html_email("Checkpoint", "loss < 0.5\nacc & f1", false);

        assert!(html.contains("<h2>Checkpoint</h2>"));
        assert!(html.contains("loss &lt; 0.5<br>\nacc &amp; f1"));
        assert!(!html.contains("is attached"));
    }

    #[test]
    fn test_attachment_note() {
        assert!(html_email("s", "b", true).contains("Metric history is attached"));
    }
}
