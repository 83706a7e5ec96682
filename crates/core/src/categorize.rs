use std::collections::BTreeMap;

use crate::model::{Category, CategoryUsage, Entry, MESSAGE_CONTENT_TYPE};

/// Which entries a rule may match. Message rules never see files and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    Files,
    Messages,
}

/// One row of the ordered categorization table.
///
/// A rule matches when the scope fits, the content matches (any extension,
/// exact content type or content-type prefix; an empty content list matches
/// everything) and, if keywords are given, at least one keyword occurs in the
/// lower-cased haystack.
#[derive(Debug)]
pub struct CategoryRule {
    pub id: &'static str,
    pub category: Category,
    pub scope: RuleScope,
    pub extensions: &'static [&'static str],
    pub content_types: &'static [&'static str],
    pub content_type_prefixes: &'static [&'static str],
    pub keywords: &'static [&'static str],
}

/// The attributes the categorizer looks at.
#[derive(Debug, Clone, Copy)]
pub struct EntryTraits<'a> {
    pub content_type: Option<&'a str>,
    pub extension: Option<&'a str>,
    pub name: &'a str,
    pub location: &'a str,
}

impl<'a> EntryTraits<'a> {
    pub fn of(entry: &'a Entry) -> Self {
        Self {
            content_type: entry.content_type.as_deref(),
            extension: entry.extension.as_deref(),
            name: &entry.name,
            location: &entry.location,
        }
    }

    fn scope(&self) -> RuleScope {
        if self.content_type == Some(MESSAGE_CONTENT_TYPE) {
            RuleScope::Messages
        } else {
            RuleScope::Files
        }
    }
}

const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "rtf", "odt", "txt"];
const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/rtf",
    "text/plain",
];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xls", "xlsx", "csv", "ods"];
const SPREADSHEET_TYPES: &[&str] = &[
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/csv",
];
const PRESENTATION_EXTENSIONS: &[&str] = &["ppt", "pptx", "odp", "key"];
const PRESENTATION_TYPES: &[&str] = &[
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "heic"];
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z", "tar", "gz"];
const ARCHIVE_TYPES: &[&str] = &[
    "application/zip",
    "application/x-rar-compressed",
    "application/vnd.rar",
    "application/x-7z-compressed",
    "application/x-tar",
    "application/gzip",
];
const EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "msi", "app", "bat", "sh", "dmg"];
const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "html", "css", "java", "cpp", "c", "h", "rs", "go", "rb",
];

const NONE: &[&str] = &[];

const fn file_rule(
    id: &'static str,
    category: Category,
    extensions: &'static [&'static str],
    content_types: &'static [&'static str],
    keywords: &'static [&'static str],
) -> CategoryRule {
    CategoryRule {
        id,
        category,
        scope: RuleScope::Files,
        extensions,
        content_types,
        content_type_prefixes: NONE,
        keywords,
    }
}

const fn native_rule(id: &'static str, category: Category, prefix: &'static [&'static str]) -> CategoryRule {
    CategoryRule {
        id,
        category,
        scope: RuleScope::Files,
        extensions: NONE,
        content_types: NONE,
        content_type_prefixes: prefix,
        keywords: NONE,
    }
}

const fn message_rule(
    id: &'static str,
    category: Category,
    keywords: &'static [&'static str],
) -> CategoryRule {
    CategoryRule {
        id,
        category,
        scope: RuleScope::Messages,
        extensions: NONE,
        content_types: NONE,
        content_type_prefixes: NONE,
        keywords,
    }
}

/// Ordered, first match wins. Keyword rules sit before the generic rule of the
/// same content family.
pub static CATEGORY_RULES: &[CategoryRule] = &[
    native_rule(
        "native_document",
        Category::GoogleDocs,
        &["application/vnd.google-apps.document"],
    ),
    native_rule(
        "native_spreadsheet",
        Category::GoogleSheets,
        &["application/vnd.google-apps.spreadsheet"],
    ),
    native_rule(
        "native_presentation",
        Category::GoogleSlides,
        &["application/vnd.google-apps.presentation"],
    ),
    native_rule(
        "native_form",
        Category::GoogleForms,
        &["application/vnd.google-apps.form"],
    ),
    native_rule(
        "native_other",
        Category::GoogleFiles,
        &["application/vnd.google-apps."],
    ),
    file_rule(
        "legal_contract_document",
        Category::LegalContracts,
        DOCUMENT_EXTENSIONS,
        DOCUMENT_TYPES,
        &["contract", "agreement"],
    ),
    file_rule(
        "legal_pleading_document",
        Category::LegalPleadings,
        DOCUMENT_EXTENSIONS,
        DOCUMENT_TYPES,
        &["pleading", "motion"],
    ),
    file_rule(
        "legal_discovery_document",
        Category::LegalDiscovery,
        DOCUMENT_EXTENSIONS,
        DOCUMENT_TYPES,
        &["discovery"],
    ),
    file_rule(
        "legal_correspondence_document",
        Category::LegalCorrespondence,
        DOCUMENT_EXTENSIONS,
        DOCUMENT_TYPES,
        &["letter"],
    ),
    file_rule(
        "document",
        Category::Documents,
        DOCUMENT_EXTENSIONS,
        DOCUMENT_TYPES,
        NONE,
    ),
    file_rule(
        "billing_spreadsheet",
        Category::Billing,
        SPREADSHEET_EXTENSIONS,
        SPREADSHEET_TYPES,
        &["billing", "invoice"],
    ),
    file_rule(
        "spreadsheet",
        Category::Spreadsheets,
        SPREADSHEET_EXTENSIONS,
        SPREADSHEET_TYPES,
        NONE,
    ),
    file_rule(
        "presentation",
        Category::Presentations,
        PRESENTATION_EXTENSIONS,
        PRESENTATION_TYPES,
        NONE,
    ),
    CategoryRule {
        id: "image",
        category: Category::Images,
        scope: RuleScope::Files,
        extensions: IMAGE_EXTENSIONS,
        content_types: NONE,
        content_type_prefixes: &["image/"],
        keywords: NONE,
    },
    file_rule(
        "archive",
        Category::Archives,
        ARCHIVE_EXTENSIONS,
        ARCHIVE_TYPES,
        NONE,
    ),
    file_rule(
        "executable",
        Category::Executables,
        EXECUTABLE_EXTENSIONS,
        &["application/x-msdownload", "application/x-sh"],
        NONE,
    ),
    file_rule("code", Category::Code, CODE_EXTENSIONS, NONE, NONE),
    message_rule(
        "message_client_communication",
        Category::ClientCommunication,
        &["re:", "fw:", "fwd:", "update", "status"],
    ),
    message_rule(
        "message_court_deadline",
        Category::CourtDeadline,
        &["hearing", "motion", "deadline", "filing", "court"],
    ),
    message_rule(
        "message_billing",
        Category::Billing,
        &["invoice", "payment", "billing", "hours"],
    ),
    message_rule(
        "message_marketing",
        Category::Marketing,
        &["referral", "lead", "inquiry", "consultation"],
    ),
    message_rule(
        "message_admin",
        Category::Admin,
        &["staff", "meeting", "calendar", "internal"],
    ),
];

impl CategoryRule {
    pub fn matches(&self, traits: &EntryTraits<'_>) -> bool {
        if self.scope != traits.scope() {
            return false;
        }
        if !self.matches_content(traits) {
            return false;
        }
        if self.keywords.is_empty() {
            return true;
        }

        let haystack = match self.scope {
            RuleScope::Messages => traits.name.to_lowercase(),
            RuleScope::Files => format!("{}/{}", traits.location, traits.name).to_lowercase(),
        };
        contains_any(&haystack, self.keywords)
    }

    fn matches_content(&self, traits: &EntryTraits<'_>) -> bool {
        if self.extensions.is_empty()
            && self.content_types.is_empty()
            && self.content_type_prefixes.is_empty()
        {
            return true;
        }

        let extension_hit = traits
            .extension
            .is_some_and(|ext| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)));
        let content_type = traits.content_type.map(|value| value.to_ascii_lowercase());
        let type_hit = content_type.as_deref().is_some_and(|value| {
            self.content_types.contains(&value)
                || self
                    .content_type_prefixes
                    .iter()
                    .any(|prefix| value.starts_with(prefix))
        });
        extension_hit || type_hit
    }
}

pub fn matching_rule(traits: &EntryTraits<'_>) -> Option<&'static CategoryRule> {
    CATEGORY_RULES.iter().find(|rule| rule.matches(traits))
}

pub fn categorize(traits: &EntryTraits<'_>) -> Category {
    matching_rule(traits)
        .map(|rule| rule.category)
        .unwrap_or(Category::Other)
}

pub fn category_usage(entries: &[Entry]) -> BTreeMap<Category, CategoryUsage> {
    let mut usage: BTreeMap<Category, CategoryUsage> = BTreeMap::new();
    for entry in entries {
        let slot = usage.entry(entry.category).or_default();
        slot.count += 1;
        slot.bytes = slot.bytes.saturating_add(entry.size_bytes);
    }
    usage
}

fn contains_any(value: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| value.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::{categorize, matching_rule, EntryTraits, CATEGORY_RULES};
    use crate::model::{Category, MESSAGE_CONTENT_TYPE};
    use std::collections::HashSet;

    fn file<'a>(name: &'a str, extension: Option<&'a str>, location: &'a str) -> EntryTraits<'a> {
        EntryTraits {
            content_type: None,
            extension,
            name,
            location,
        }
    }

    fn message(subject: &str) -> EntryTraits<'_> {
        EntryTraits {
            content_type: Some(MESSAGE_CONTENT_TYPE),
            extension: None,
            name: subject,
            location: "INBOX",
        }
    }

    #[test]
    fn rule_ids_are_unique() {
        let ids = CATEGORY_RULES.iter().map(|rule| rule.id).collect::<HashSet<_>>();
        assert_eq!(ids.len(), CATEGORY_RULES.len());
    }

    #[test]
    fn legal_keywords_win_over_generic_documents() {
        assert_eq!(
            categorize(&file("Smith_Engagement_Agreement.pdf", Some("pdf"), "clients/smith")),
            Category::LegalContracts
        );
        assert_eq!(
            categorize(&file("draft.docx", Some("docx"), "matters/jones/motions")),
            Category::LegalPleadings
        );
        assert_eq!(
            categorize(&file("notes.docx", Some("docx"), "clients")),
            Category::Documents
        );
    }

    #[test]
    fn billing_keyword_applies_to_spreadsheets_only() {
        assert_eq!(
            categorize(&file("invoice_march.xlsx", Some("xlsx"), "")),
            Category::Billing
        );
        assert_eq!(
            categorize(&file("intake.csv", Some("csv"), "")),
            Category::Spreadsheets
        );
        assert_eq!(
            categorize(&file("invoice_scan.png", Some("png"), "")),
            Category::Images
        );
    }

    #[test]
    fn native_cloud_types_use_content_type() {
        let traits = EntryTraits {
            content_type: Some("application/vnd.google-apps.spreadsheet"),
            extension: None,
            name: "Billing tracker",
            location: "",
        };
        assert_eq!(categorize(&traits), Category::GoogleSheets);

        let drawing = EntryTraits {
            content_type: Some("application/vnd.google-apps.drawing"),
            extension: None,
            name: "Org chart",
            location: "",
        };
        assert_eq!(categorize(&drawing), Category::GoogleFiles);
    }

    #[test]
    fn content_type_prefix_matches_images_without_extension() {
        let traits = EntryTraits {
            content_type: Some("image/webp"),
            extension: None,
            name: "scan",
            location: "",
        };
        assert_eq!(categorize(&traits), Category::Images);
    }

    #[test]
    fn message_rules_follow_table_order() {
        assert_eq!(
            categorize(&message("Re: hearing schedule")),
            Category::ClientCommunication
        );
        assert_eq!(
            categorize(&message("Motion filing deadline")),
            Category::CourtDeadline
        );
        assert_eq!(categorize(&message("Invoice #442")), Category::Billing);
        assert_eq!(
            categorize(&message("New consultation request")),
            Category::Marketing
        );
        assert_eq!(categorize(&message("Staff lunch")), Category::Admin);
        assert_eq!(categorize(&message("Hello")), Category::Other);
    }

    #[test]
    fn message_subject_with_file_extension_stays_a_message() {
        let traits = message("contract.pdf attached");
        assert_eq!(categorize(&traits), Category::Other);
        assert!(matching_rule(&traits).is_none());
    }

    #[test]
    fn unknown_files_fall_back_to_other() {
        assert_eq!(categorize(&file("data.bin", Some("bin"), "")), Category::Other);
        assert_eq!(categorize(&file("README", None, "")), Category::Other);
    }
}
