//! Unit tests for typed identifiers and the academic-year value type

use core_kernel::{AcademicYear, FeeItemId, InvoiceId, PaymentId, StudentId};
use uuid::Uuid;

mod typed_ids {
    use super::*;

    #[test]
    fn test_display_includes_prefix() {
        assert!(StudentId::new().to_string().starts_with("STU-"));
        assert!(InvoiceId::new().to_string().starts_with("INV-"));
        assert!(PaymentId::new().to_string().starts_with("PAY-"));
    }

    #[test]
    fn test_round_trip_through_display() {
        let original = FeeItemId::new();
        let parsed: FeeItemId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_parses_bare_uuid() {
        let uuid = Uuid::new_v4();
        let parsed: StudentId = uuid.to_string().parse().unwrap();
        assert_eq!(parsed, StudentId::from(uuid));
    }

    #[test]
    fn test_rejects_garbage() {
        let result: Result<InvoiceId, _> = "not-a-uuid".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_distinct_ids_are_unequal() {
        assert_ne!(PaymentId::new(), PaymentId::new());
    }
}

mod academic_year {
    use super::*;

    #[test]
    fn test_display_form() {
        assert_eq!(AcademicYear::new(2025).to_string(), "2025/26");
    }

    #[test]
    fn test_ordering_follows_start_year() {
        assert!(AcademicYear::new(2024) < AcademicYear::new(2025));
    }

    #[test]
    fn test_from_i32() {
        let year: AcademicYear = 2026.into();
        assert_eq!(year.start_year(), 2026);
    }
}
