//! Shared rows for database unit tests.

use chrono::NaiveDate;

use super::models::{Owner, Patient};
use super::owners::OwnerInput;
use super::patients::PatientInput;
use super::Database;

pub(crate) async fn owner(db: &Database, last_name: &str) -> Owner {
    db.create_owner(&OwnerInput {
        salutation: None,
        first_name: "Test".to_string(),
        last_name: last_name.to_string(),
        email: None,
        phone: None,
        street: None,
        zip: None,
        city: None,
        notes: None,
    })
    .await
    .expect("create owner")
}

pub(crate) async fn patient(db: &Database, owner_id: i64, name: &str) -> Patient {
    db.create_patient(&PatientInput {
        owner_id,
        name: name.to_string(),
        species: "Hund".to_string(),
        breed: None,
        birth_date: NaiveDate::from_ymd_opt(2019, 4, 1),
        gender: None,
        weight_kg: Some(24.5),
        microchip: None,
        notes: None,
        is_active: None,
    })
    .await
    .expect("create patient")
}
