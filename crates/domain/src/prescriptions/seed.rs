use chrono::NaiveDate;

use super::aggregate::{NewPrescription, Prescription, Priority};

/// Prescriptions a fresh store starts with.
pub fn prescriptions() -> Vec<Prescription> {
    [NewPrescription {
        prescription_id: "RX-2001".to_string(),
        patient_id: "P-1001".to_string(),
        patient_name: "Ravi Kumar".to_string(),
        medicines: vec![
            "Paracetamol 500mg - 1 tab 8hr".to_string(),
            "Ibuprofen 200mg - 1 tab 12hr".to_string(),
        ],
        date: NaiveDate::from_ymd_opt(2025, 9, 10).unwrap_or_default(),
        doctor: Some("Dr. Smith".to_string()),
        priority: Some(Priority::Normal),
        notes: None,
    }]
    .into_iter()
    .filter_map(|input| Prescription::issue(input).ok())
    .collect()
}
