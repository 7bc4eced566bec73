//! HTML email bodies.
//!
//! Templates are filled by plain placeholder substitution. User-supplied
//! and plain-text values are HTML-escaped; the digest content is already an
//! HTML fragment and is inserted as-is.

use html_escape::encode_text;

pub const WELCOME_EMAIL_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Welcome to Signalist</title></head>
<body style="margin:0;padding:40px 20px;background-color:#050505;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Helvetica,Arial,sans-serif;color:#ccdadc;">
  <div style="max-width:600px;margin:0 auto;background-color:#141414;border:1px solid #30333a;border-radius:8px;padding:40px;">
    <h1 style="color:#fdd458;font-size:24px;margin-top:0;">Welcome aboard, {{name}}</h1>
    <p style="line-height:1.6;">{{intro}}</p>
    <p style="line-height:1.6;">Here is what you can do right now:</p>
    <ul style="line-height:1.8;">
      <li>Build a watchlist of the companies you follow</li>
      <li>Set price and volume alerts</li>
      <li>Read your personalized market digest every day</li>
    </ul>
    <p style="color:#9095a1;font-size:13px;margin-bottom:0;">You are receiving this email because you signed up for Signalist.</p>
  </div>
</body>
</html>
"#;

pub const NEWS_SUMMARY_EMAIL_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Market News Summary</title></head>
<body style="margin:0;padding:40px 20px;background-color:#050505;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Helvetica,Arial,sans-serif;color:#ccdadc;">
  <div style="max-width:700px;margin:0 auto;background-color:#141414;border:1px solid #30333a;border-radius:8px;padding:40px;">
    <h1 style="color:#fdd458;font-size:24px;margin-top:0;">Market News Summary Today</h1>
    <p style="color:#9095a1;font-size:14px;">{{date}}</p>
    <div style="line-height:1.6;">{{newsContent}}</div>
    <p style="color:#9095a1;font-size:13px;margin-bottom:0;">You are receiving this digest because you subscribed to Signalist news updates.</p>
  </div>
</body>
</html>
"#;

pub fn render_welcome(name: &str, intro: &str) -> String {
    WELCOME_EMAIL_TEMPLATE
        .replace("{{name}}", &encode_text(name))
        .replace("{{intro}}", &encode_text(intro))
}

pub fn render_digest(date: &str, news_content: &str) -> String {
    NEWS_SUMMARY_EMAIL_TEMPLATE
        .replace("{{date}}", &encode_text(date))
        .replace("{{newsContent}}", news_content)
}
