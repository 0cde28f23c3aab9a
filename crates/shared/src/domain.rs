use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, uuid::Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(UserId, "user");
id_newtype!(BatchId, "batch");
id_newtype!(CandidateId, "ADM");
id_newtype!(PaymentId, "pay");
id_newtype!(AuditLogId, "audit");

/// Unix epoch milliseconds.
pub type Millis = i64;

pub fn now_millis() -> Millis {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    SuperAdmin,
    Executive,
    ViewOnly,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::Executive => "EXECUTIVE",
            Self::ViewOnly => "VIEW_ONLY",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SUPER_ADMIN" => Some(Self::SuperAdmin),
            "EXECUTIVE" => Some(Self::Executive),
            "VIEW_ONLY" => Some(Self::ViewOnly),
            _ => None,
        }
    }

    /// Executives only ever see the candidates they own.
    pub fn sees_all_candidates(self) -> bool {
        !matches!(self, Self::Executive)
    }

    pub fn can_edit_candidates(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Executive)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmissionStatus {
    #[default]
    Confirmed,
    Deferred,
    Cancelled,
}

impl AdmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "CONFIRMED",
            Self::Deferred => "DEFERRED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "CONFIRMED" => Some(Self::Confirmed),
            "DEFERRED" => Some(Self::Deferred),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    AdvancePaid,
    FullyPaid,
    Deferred,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AdvancePaid => "ADVANCE_PAID",
            Self::FullyPaid => "FULLY_PAID",
            Self::Deferred => "DEFERRED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ADVANCE_PAID" => Some(Self::AdvancePaid),
            "FULLY_PAID" => Some(Self::FullyPaid),
            "DEFERRED" => Some(Self::Deferred),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Statuses set by hand that payment history never overrides.
    pub fn is_manual_override(self) -> bool {
        matches!(self, Self::Deferred | Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub role: UserRole,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(default = "BatchId::generate")]
    pub id: BatchId,
    pub name: String,
    pub max_seats: u32,
    #[serde(default)]
    pub created_at: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEntry {
    pub id: PaymentId,
    pub amount: i64,
    pub utr: String,
    #[serde(default)]
    pub screenshot: String,
    pub date: Millis,
    pub executive_id: UserId,
    #[serde(default)]
    pub executive_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: AuditLogId,
    pub timestamp: Millis,
    pub action: String,
    pub user_id: UserId,
    pub user_name: String,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Medium {
    Hindi,
    #[default]
    English,
    Urdu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TravelMode {
    Train,
    Flight,
    Bus,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateOfBirth {
    pub day: String,
    pub month: String,
    pub year: String,
}

impl Default for DateOfBirth {
    fn default() -> Self {
        Self {
            day: "01".into(),
            month: "01".into(),
            year: "2000".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonalDetails {
    pub full_name: String,
    pub email: String,
    pub gender: Gender,
    pub dob: DateOfBirth,
    pub qualification: String,
    pub medium: Medium,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactDetails {
    pub calling_number: String,
    pub whatsapp_number: String,
    pub emergency_contact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddressDetails {
    pub country: String,
    pub address: String,
    pub state: String,
    pub city: String,
    pub pincode: String,
}

impl Default for AddressDetails {
    fn default() -> Self {
        Self {
            country: "India".into(),
            address: String::new(),
            state: String::new(),
            city: String::new(),
            pincode: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TravelDetails {
    pub mode: TravelMode,
    pub arrival_date: String,
    pub arrival_time: String,
    pub pickup_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Documents {
    pub aadhar_card: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default = "CandidateId::generate")]
    pub id: CandidateId,
    #[serde(default)]
    pub batch_id: BatchId,
    #[serde(default)]
    pub executive_id: UserId,
    #[serde(default)]
    pub status: AdmissionStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub personal_details: PersonalDetails,
    #[serde(default)]
    pub contact_details: ContactDetails,
    #[serde(default)]
    pub address_details: AddressDetails,
    #[serde(default)]
    pub travel_details: TravelDetails,
    #[serde(default)]
    pub documents: Documents,
    #[serde(default)]
    pub payment_history: Vec<PaymentEntry>,
    #[serde(default)]
    pub created_at: Millis,
    #[serde(default)]
    pub updated_at: Millis,
}

impl Candidate {
    pub fn is_cancelled(&self) -> bool {
        self.status == AdmissionStatus::Cancelled
    }
}
