use crate::annotator::category::Category;
use crate::annotator::rotor::ChatMessage;

fn describe(category: Category) -> Option<&'static str> {
    match category {
        Category::PersonalName => Some(
            "personal names; keep first name, last name and professional titles such as Ing. or JUDr. inside the tag",
        ),
        Category::Institution => Some(
            "names of specific government, political, cultural, educational or scientific agencies and institutions",
        ),
        Category::Company => Some("company names, including social media platforms"),
        Category::Location => Some("place names such as cities and streets"),
        Category::Date => Some("dates"),
        Category::Zipcode => Some("5-digit Czech postal codes, e.g. \"123 45\""),
        Category::Phone => Some("phone numbers"),
        Category::Email => Some("email addresses"),
        Category::CaseNumber => Some(
            "court case numbers (číslo jednací, č. j., spisová značka)",
        ),
        Category::Act => Some(
            "references to laws and legal acts, e.g. \"zákon č. 89/2012 Sb.\" or \"s. ř. s.\"",
        ),
        Category::Web => Some("web page URLs (www addresses)"),
        Category::Money => None,
    }
}

fn tag(category: Category, inner: &str) -> String {
    format!("<{code}>{inner}</{code}>", code = category.code())
}

/// Instructions sent ahead of every chunk.
pub fn system_prompt() -> String {
    let mut out = String::from(
        "You are an assistant that classifies Czech words and phrases into categories of personal data.\n\n\
         Wrap each such section in a tag naming its category:\n",
    );
    for category in Category::ALL {
        if let Some(text) = describe(category) {
            out.push_str(&format!("- <{}> for {text}\n", category.code()));
        }
    }
    out.push_str(
        "\nLeave non-relevant text untagged. \
         Close every tag before the next one starts. \
         When categories overlap, use the most relevant one.\n\n",
    );
    out.push_str(
        "Example input:\n\
         Here is some text. Jan Novák, Ing., works at XYZ Company and can be reached at jan.novak@example.com +420 123 456 789. More information is available.\n",
    );
    out.push_str(&format!(
        "Example output:\n\
         Here is some text. {}, works at {} and can be reached at {} {}. More information is available.\n\n",
        tag(Category::PersonalName, "Jan Novák, Ing."),
        tag(Category::Company, "XYZ Company"),
        tag(Category::Email, "jan.novak@example.com"),
        tag(Category::Phone, "+420 123 456 789"),
    ));
    out.push_str(
        "Return only the original text with the added tags.\n\
         Do not remove whitespace.\n\
         Do not include any explanation or additional text in the response.",
    );
    out
}

pub fn build_messages(chunk_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt()),
        ChatMessage::user(chunk_text),
    ]
}

#[cfg(test)]
mod tests {
    use super::{build_messages, system_prompt};

    #[test]
    fn prompt_lists_every_taggable_category() {
        let prompt = system_prompt();
        for code in [
            "<pn>", "<i>", "<c>", "<l>", "<d>", "<z>", "<p>", "<e>", "<cj>", "<a>", "<w>",
        ] {
            assert!(prompt.contains(code), "missing {code}");
        }
        assert!(!prompt.contains("<m>"));
        assert!(prompt.contains("<pn>Jan Novák, Ing.</pn>"));
    }

    #[test]
    fn chunk_is_sent_as_user_message() {
        let messages = build_messages("Ahoj já jsem Honza");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "Ahoj já jsem Honza");
    }
}
