//! Structured decisions: the strictly-typed outcomes of a finalized
//! conversation.
//!
//! A [`StructuredDecision`] can only be built by [`StructuredDecision::validate`],
//! which performs explicit structural checks per variant. Malformed
//! candidates never become a decision.
//!
//! Wire shapes:
//!
//! ```json
//! {"intent": "handoff_to_operator", "reason": "..."}
//! {"intent": "make_referral", "fio": "...", "preliminary_assessment": "...", "doctor_type": "терапевт"}
//! {"intent": "no_referral_needed", "reason": "..."}
//! ```

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Which decision shape the caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionKind {
    Handoff,
    Referral,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Handoff => "handoff",
            DecisionKind::Referral => "referral",
        }
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of specialists a referral may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DoctorType {
    #[serde(rename = "терапевт")]
    Therapist,
    #[serde(rename = "ЛОР")]
    Otolaryngologist,
    #[serde(rename = "дерматолог")]
    Dermatologist,
    #[serde(rename = "офтальмолог")]
    Ophthalmologist,
    #[serde(rename = "невролог")]
    Neurologist,
    #[serde(rename = "кардиолог")]
    Cardiologist,
    #[serde(rename = "хирург")]
    Surgeon,
    #[serde(rename = "травматолог")]
    Traumatologist,
    #[serde(rename = "эндокринолог")]
    Endocrinologist,
    #[serde(rename = "гинеколог")]
    Gynecologist,
    #[serde(rename = "уролог")]
    Urologist,
    #[serde(rename = "гастроэнтеролог")]
    Gastroenterologist,
    #[serde(rename = "педиатр")]
    Pediatrician,
}

impl DoctorType {
    pub const ALL: [DoctorType; 13] = [
        DoctorType::Therapist,
        DoctorType::Otolaryngologist,
        DoctorType::Dermatologist,
        DoctorType::Ophthalmologist,
        DoctorType::Neurologist,
        DoctorType::Cardiologist,
        DoctorType::Surgeon,
        DoctorType::Traumatologist,
        DoctorType::Endocrinologist,
        DoctorType::Gynecologist,
        DoctorType::Urologist,
        DoctorType::Gastroenterologist,
        DoctorType::Pediatrician,
    ];

    /// The wire name of this specialty.
    pub fn as_str(&self) -> &'static str {
        match self {
            DoctorType::Therapist => "терапевт",
            DoctorType::Otolaryngologist => "ЛОР",
            DoctorType::Dermatologist => "дерматолог",
            DoctorType::Ophthalmologist => "офтальмолог",
            DoctorType::Neurologist => "невролог",
            DoctorType::Cardiologist => "кардиолог",
            DoctorType::Surgeon => "хирург",
            DoctorType::Traumatologist => "травматолог",
            DoctorType::Endocrinologist => "эндокринолог",
            DoctorType::Gynecologist => "гинеколог",
            DoctorType::Urologist => "уролог",
            DoctorType::Gastroenterologist => "гастроэнтеролог",
            DoctorType::Pediatrician => "педиатр",
        }
    }

    /// Exact match against the wire names. No case folding.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.as_str() == name)
    }
}

impl std::fmt::Display for DoctorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hand the conversation to a human operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    pub reason: String,
}

/// Outcome of a satisfied conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Referral {
    MakeReferral {
        fio: String,
        preliminary_assessment: String,
        doctor_type: DoctorType,
    },
    NoReferralNeeded {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredDecision {
    Handoff(Handoff),
    Referral(Referral),
}

const INTENT_HANDOFF: &str = "handoff_to_operator";
const INTENT_MAKE_REFERRAL: &str = "make_referral";
const INTENT_NO_REFERRAL: &str = "no_referral_needed";

impl StructuredDecision {
    /// Validate a parsed JSON value against the shape named by `kind`.
    ///
    /// Returns a human-readable diagnostic on failure. Referral fields are
    /// type-checked whenever present, whatever the intent; unknown fields
    /// are ignored.
    pub fn validate(value: &Value, kind: DecisionKind) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {}", json_type(value)))?;
        let intent = required_str(obj, "intent")?;

        let mut doctor_type = None;
        if kind == DecisionKind::Referral {
            optional_str(obj, "fio")?;
            optional_str(obj, "preliminary_assessment")?;
            doctor_type = optional_str(obj, "doctor_type")?
                .map(parse_doctor_type)
                .transpose()?;
        }

        match (kind, intent) {
            (DecisionKind::Handoff, INTENT_HANDOFF) => Ok(StructuredDecision::Handoff(Handoff {
                reason: required_str(obj, "reason")?.to_string(),
            })),
            (DecisionKind::Referral, INTENT_MAKE_REFERRAL) => {
                let fio = required_str(obj, "fio")?;
                let preliminary_assessment = required_str(obj, "preliminary_assessment")?;
                let doctor_type =
                    doctor_type.ok_or_else(|| "missing required field `doctor_type`".to_string())?;
                Ok(StructuredDecision::Referral(Referral::MakeReferral {
                    fio: fio.to_string(),
                    preliminary_assessment: preliminary_assessment.to_string(),
                    doctor_type,
                }))
            }
            (DecisionKind::Referral, INTENT_NO_REFERRAL) => {
                Ok(StructuredDecision::Referral(Referral::NoReferralNeeded {
                    reason: required_str(obj, "reason")?.to_string(),
                }))
            }
            (DecisionKind::Handoff, other) => Err(format!(
                "field `intent` must be `{INTENT_HANDOFF}`, got `{other}`"
            )),
            (DecisionKind::Referral, other) => Err(format!(
                "field `intent` must be `{INTENT_MAKE_REFERRAL}` or `{INTENT_NO_REFERRAL}`, got `{other}`"
            )),
        }
    }

    pub fn kind(&self) -> DecisionKind {
        match self {
            StructuredDecision::Handoff(_) => DecisionKind::Handoff,
            StructuredDecision::Referral(_) => DecisionKind::Referral,
        }
    }

    /// The `intent` tag this decision serializes with.
    pub fn intent(&self) -> &'static str {
        match self {
            StructuredDecision::Handoff(_) => INTENT_HANDOFF,
            StructuredDecision::Referral(Referral::MakeReferral { .. }) => INTENT_MAKE_REFERRAL,
            StructuredDecision::Referral(Referral::NoReferralNeeded { .. }) => INTENT_NO_REFERRAL,
        }
    }
}

/// Flat wire shape, tagged by `intent`.
#[derive(Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
enum WireDecision<'a> {
    HandoffToOperator {
        reason: &'a str,
    },
    MakeReferral {
        fio: &'a str,
        preliminary_assessment: &'a str,
        doctor_type: DoctorType,
    },
    NoReferralNeeded {
        reason: &'a str,
    },
}

impl Serialize for StructuredDecision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            StructuredDecision::Handoff(Handoff { reason }) => {
                WireDecision::HandoffToOperator { reason }
            }
            StructuredDecision::Referral(Referral::MakeReferral {
                fio,
                preliminary_assessment,
                doctor_type,
            }) => WireDecision::MakeReferral {
                fio,
                preliminary_assessment,
                doctor_type: *doctor_type,
            },
            StructuredDecision::Referral(Referral::NoReferralNeeded { reason }) => {
                WireDecision::NoReferralNeeded { reason }
            }
        };
        wire.serialize(serializer)
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &str) -> Result<&'a str, String> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(format!("missing required field `{field}`")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(format!("field `{field}` must not be empty"))
        }
        Some(Value::String(s)) => Ok(s.trim()),
        Some(other) => Err(format!(
            "field `{field}` must be a string, got {}",
            json_type(other)
        )),
    }
}

/// A field that may be absent or null, but must be a string otherwise.
fn optional_str<'a>(obj: &'a Map<String, Value>, field: &str) -> Result<Option<&'a str>, String> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(other) => Err(format!(
            "field `{field}` must be a string, got {}",
            json_type(other)
        )),
    }
}

fn parse_doctor_type(name: &str) -> Result<DoctorType, String> {
    DoctorType::parse(name).ok_or_else(|| {
        let allowed: Vec<&str> = DoctorType::ALL.iter().map(|d| d.as_str()).collect();
        format!(
            "field `doctor_type` has unknown value `{name}`, expected one of: {}",
            allowed.join(", ")
        )
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
