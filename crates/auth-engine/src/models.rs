//! User and wire types for the auth endpoints.
//!
//! Profiles are tagged per role at the boundary: the backend ships
//! nested fields (emergency contact, medical history) either as
//! structured JSON or as embedded JSON strings, so everything is
//! parsed or defaulted here, once, rather than re-parsed downstream.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Patient,
    Doctor,
}

/// Emergency contact for a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
}

/// Patient-specific profile fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    /// May arrive as an embedded JSON string; malformed input decodes
    /// to None.
    #[serde(default, deserialize_with = "parse_or_default")]
    pub emergency_contact: Option<EmergencyContact>,
    /// May arrive as an embedded JSON string; malformed input decodes
    /// to an empty list.
    #[serde(default, deserialize_with = "parse_or_default")]
    pub medical_history: Vec<String>,
}

/// Doctor-specific profile fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    #[serde(default)]
    pub clinic_name: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
}

/// Role-tagged profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Profile {
    Patient(PatientProfile),
    Doctor(DoctorProfile),
}

/// Authenticated user record.
///
/// Deserialization runs through the wire shape so the profile is
/// branched by role and parse-or-defaulted exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireUser")]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Deserialize)]
struct WireUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    role: Role,
    #[serde(default)]
    profile: Option<serde_json::Value>,
}

impl From<WireUser> for UserRecord {
    fn from(wire: WireUser) -> Self {
        let profile = wire.profile.and_then(|value| match wire.role {
            Role::Patient => serde_json::from_value::<PatientProfile>(value)
                .ok()
                .map(Profile::Patient),
            Role::Doctor => serde_json::from_value::<DoctorProfile>(value)
                .ok()
                .map(Profile::Doctor),
        });

        Self {
            id: wire.id,
            email: wire.email,
            role: wire.role,
            profile,
        }
    }
}

/// Accept a structured value or an embedded JSON string; anything
/// malformed decodes to the type's default instead of failing the
/// whole record.
fn parse_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(embedded) => {
            serde_json::from_str(&embedded).unwrap_or_default()
        }
        serde_json::Value::Null => T::default(),
        other => serde_json::from_value(other).unwrap_or_default(),
    })
}

// ==========================================
// Wire requests/responses
// ==========================================

/// Login request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration request body. The role decides which profile section
/// the backend reads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_profile: Option<PatientProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_profile: Option<DoctorProfile>,
}

impl RegisterRequest {
    /// Build a patient registration payload.
    pub fn patient(
        email: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
        profile: Option<PatientProfile>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: name.into(),
            role: Role::Patient,
            patient_profile: profile,
            doctor_profile: None,
        }
    }

    /// Build a doctor registration payload.
    pub fn doctor(
        email: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
        profile: Option<DoctorProfile>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: name.into(),
            role: Role::Doctor,
            patient_profile: None,
            doctor_profile: profile,
        }
    }
}

/// Login/register response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
    pub user: UserRecord,
}

/// Token refresh request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token refresh response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub token: String,
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_user_with_structured_profile() {
        let json = r#"{
            "id": "user-1",
            "email": "pat@example.com",
            "role": "PATIENT",
            "profile": {
                "dateOfBirth": "1990-04-02",
                "emergencyContact": {"name": "Ana", "phone": "+34600111222"},
                "medicalHistory": ["penicillin allergy"]
            }
        }"#;

        let user: UserRecord = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::Patient);
        match user.profile.unwrap() {
            Profile::Patient(p) => {
                assert_eq!(p.emergency_contact.unwrap().name, "Ana");
                assert_eq!(p.medical_history, vec!["penicillin allergy"]);
                assert_eq!(
                    p.date_of_birth,
                    Some(NaiveDate::from_ymd_opt(1990, 4, 2).unwrap())
                );
            }
            other => panic!("expected patient profile, got {:?}", other),
        }
    }

    #[test]
    fn test_patient_profile_with_embedded_json_strings() {
        // Backends sometimes double-encode nested profile fields.
        let json = r#"{
            "id": "user-2",
            "role": "PATIENT",
            "profile": {
                "emergencyContact": "{\"name\":\"Luis\",\"phone\":\"+34600333444\"}",
                "medicalHistory": "[\"diabetes\",\"hypertension\"]"
            }
        }"#;

        let user: UserRecord = serde_json::from_str(json).unwrap();
        match user.profile.unwrap() {
            Profile::Patient(p) => {
                assert_eq!(p.emergency_contact.unwrap().name, "Luis");
                assert_eq!(p.medical_history, vec!["diabetes", "hypertension"]);
            }
            other => panic!("expected patient profile, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_embedded_json_defaults() {
        let json = r#"{
            "id": "user-3",
            "role": "PATIENT",
            "profile": {
                "emergencyContact": "{oops not json",
                "medicalHistory": "also not json"
            }
        }"#;

        let user: UserRecord = serde_json::from_str(json).unwrap();
        match user.profile.unwrap() {
            Profile::Patient(p) => {
                assert!(p.emergency_contact.is_none());
                assert!(p.medical_history.is_empty());
            }
            other => panic!("expected patient profile, got {:?}", other),
        }
    }

    #[test]
    fn test_doctor_profile_branches_on_role() {
        let json = r#"{
            "id": "doc-1",
            "email": "dr@example.com",
            "role": "DOCTOR",
            "profile": {
                "clinicName": "Smile Clinic",
                "specialty": "orthodontics",
                "licenseNumber": "COL-1234"
            }
        }"#;

        let user: UserRecord = serde_json::from_str(json).unwrap();
        match user.profile.unwrap() {
            Profile::Doctor(d) => {
                assert_eq!(d.clinic_name.as_deref(), Some("Smile Clinic"));
                assert_eq!(d.license_number.as_deref(), Some("COL-1234"));
            }
            other => panic!("expected doctor profile, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_profile_is_none() {
        let json = r#"{"id": "user-4", "role": "DOCTOR"}"#;
        let user: UserRecord = serde_json::from_str(json).unwrap();
        assert!(user.profile.is_none());
    }

    #[test]
    fn test_unparseable_profile_is_none_not_error() {
        let json = r#"{"id": "user-5", "role": "PATIENT", "profile": 42}"#;
        let user: UserRecord = serde_json::from_str(json).unwrap();
        assert!(user.profile.is_none());
    }

    #[test]
    fn test_user_record_cache_roundtrip() {
        let json = r#"{
            "id": "user-6",
            "email": "pat@example.com",
            "role": "PATIENT",
            "profile": {"medicalHistory": ["bruxism"]}
        }"#;

        let user: UserRecord = serde_json::from_str(json).unwrap();
        let cached = serde_json::to_string(&user).unwrap();
        let reread: UserRecord = serde_json::from_str(&cached).unwrap();
        assert_eq!(reread, user);
    }

    #[test]
    fn test_auth_response_wire_shape() {
        let json = r#"{
            "token": "acc-1",
            "refreshToken": "ref-1",
            "user": {"id": "u1", "role": "PATIENT"}
        }"#;

        let resp: AuthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.token, "acc-1");
        assert_eq!(resp.refresh_token, "ref-1");
        assert_eq!(resp.user.id, "u1");
    }

    #[test]
    fn test_refresh_request_uses_camel_case() {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: "ref-1".to_string(),
        })
        .unwrap();
        assert_eq!(body["refreshToken"], "ref-1");
    }

    #[test]
    fn test_register_request_role_sections() {
        let req = RegisterRequest::doctor(
            "dr@example.com",
            "hunter2",
            "Dr. Ruiz",
            Some(DoctorProfile {
                clinic_name: Some("Smile Clinic".to_string()),
                ..Default::default()
            }),
        );

        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["role"], "DOCTOR");
        assert_eq!(body["doctorProfile"]["clinicName"], "Smile Clinic");
        assert!(body.get("patientProfile").is_none());
    }
}
