pub struct DeletionCompleteMessage {}

impl DeletionCompleteMessage {
    pub fn generate(user_email: &str) -> String {
        format!(
            "<html>
               <head>
                 <style>
                   body {{
                     font-family: Arial, sans-serif;
                     text-align: center;
                   }}
                 </style>
               </head>
             <body>
               <h1>Account Deleted</h1>
               <p>Your account for <b>{}</b> has been permanently deleted.</p>
               <p>What was deleted:</p>
               <ul style=\"display: inline-block; text-align: left;\">
                 <li>Profile and birth chart data</li>
                 <li>Tarot readings and journal entries</li>
                 <li>AI conversations and memory</li>
                 <li>Collections, rituals, and progress</li>
                 <li>Subscriptions and payment records</li>
               </ul>
               <p><i>Certain records (consent logs and the deletion audit trail) are \
               retained for legal compliance. These contain no personal content.</i></p>
               <p>Questions? Reply to this email.</p>
             </body>
             </html>",
            escape_html(user_email),
        )
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_complete_message_names_account_and_retained_records() {
        let body = DeletionCompleteMessage::generate("user-a@erasure.test");

        assert!(body.contains("<b>user-a@erasure.test</b>"));
        assert!(body.contains("permanently deleted"));
        assert!(body.contains("Subscriptions and payment records"));
        assert!(body.contains("consent logs and the deletion audit trail"));
    }

    #[test]
    fn deletion_complete_message_escapes_address() {
        let body = DeletionCompleteMessage::generate("\"<script>\"@erasure.test");

        assert!(!body.contains("<script>"));
        assert!(body.contains("&quot;&lt;script&gt;&quot;@erasure.test"));
    }
}
