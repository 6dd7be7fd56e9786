//! Tests for document records

use core_kernel::{PolicyId, UserId};
use domain_documents::{download_url, Document, DocumentError, DocumentType, NewDocument};
use proptest::prelude::*;

fn upload(size: i64, key: &str) -> Result<Document, DocumentError> {
    Document::upload(
        UserId::new(),
        NewDocument {
            policy_id: Some(PolicyId::new()),
            doc_type: DocumentType::Logbook,
            title: "Logbook KDA 123X".into(),
            filename: "logbook.pdf".into(),
            s3_key: key.into(),
            file_size: size,
            mime_type: "application/pdf".into(),
        },
    )
}

mod upload_tests {
    use super::*;

    #[test]
    fn test_upload_is_unverified() {
        let doc = upload(20_480, "documents/u1/logbook.pdf").unwrap();
        assert!(!doc.is_verified);
        assert_eq!(doc.doc_type.label(), "Logbook");
    }

    #[test]
    fn test_empty_file_rejected() {
        assert!(matches!(upload(0, "documents/a.pdf"), Err(DocumentError::Validation(_))));
    }

    #[test]
    fn test_traversal_key_rejected() {
        assert!(upload(10, "../../etc/passwd").is_err());
    }

    #[test]
    fn test_verify_once() {
        let mut doc = upload(10, "documents/b.pdf").unwrap();
        let staff = UserId::new();
        doc.verify(staff).unwrap();
        assert_eq!(doc.verified_by, Some(staff));
        assert_eq!(doc.verify(staff), Err(DocumentError::AlreadyVerified));
    }
}

mod url_tests {
    use super::*;

    #[test]
    fn test_download_url_joins_cleanly() {
        assert_eq!(download_url("/media/", "/documents/a.pdf"), "/media/documents/a.pdf");
        assert_eq!(download_url("https://cdn.example.com/media", "documents/a.pdf"), "https://cdn.example.com/media/documents/a.pdf");
    }

    #[test]
    fn test_type_parse() {
        assert_eq!("kra_pin".parse::<DocumentType>().unwrap(), DocumentType::KraPin);
        assert!("selfie".parse::<DocumentType>().is_err());
    }
}

proptest! {
    #[test]
    fn prop_download_url_has_single_separator(key in "[a-z]{1,8}(/[a-z]{1,8}){0,3}\\.pdf") {
        let url = download_url("/media/", &key);
        prop_assert!(!url.contains("//"));
        prop_assert!(url.ends_with(&key));
    }
}
