//! Domain enums stored as TEXT columns.
//!
//! Each enum serializes to the same lowercase token it is stored as, so the
//! wire format, the database and the validation messages all agree.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $variant:ident => $token:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
        )]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $( #[serde(rename = $token)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $token ),+
                }
            }

            pub fn tokens() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $token => Ok(Self::$variant), )+
                    _ => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(serialize::IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                value
                    .parse::<$name>()
                    .map_err(|e| e.to_string().into())
            }
        }
    };
}

text_enum! {
    /// Portal roles. Each role gets its own dashboard in the client.
    Role {
        Admin => "admin",
        Csp => "csp",
        Fi => "fi",
        Auditor => "auditor",
        Bank => "bank",
    }
}

text_enum! {
    UserStatus {
        Active => "active",
        Inactive => "inactive",
        Suspended => "suspended",
    }
}

text_enum! {
    CspStatus {
        Pending => "pending",
        Active => "active",
        Inactive => "inactive",
        Suspended => "suspended",
    }
}

text_enum! {
    TransactionType {
        Deposit => "deposit",
        Withdrawal => "withdrawal",
        Transfer => "transfer",
        BillPayment => "bill_payment",
        AccountOpening => "account_opening",
    }
}

text_enum! {
    TransactionStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Reversed => "reversed",
    }
}

text_enum! {
    /// Audit lifecycle. Any status may follow any other.
    AuditStatus {
        Scheduled => "scheduled",
        InProgress => "in-progress",
        Completed => "completed",
        Failed => "failed",
    }
}

text_enum! {
    AlertType {
        Fraud => "fraud",
        Compliance => "compliance",
        System => "system",
    }
}

text_enum! {
    AlertSeverity {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

text_enum! {
    AlertStatus {
        New => "new",
        Acknowledged => "acknowledged",
        Resolved => "resolved",
        FalsePositive => "false_positive",
    }
}

text_enum! {
    ApplicationStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    NotificationType {
        Sms => "sms",
        Whatsapp => "whatsapp",
        Email => "email",
        System => "system",
    }
}

text_enum! {
    NotificationStatus {
        Unread => "unread",
        Read => "read",
    }
}

impl Role {
    pub fn is_one_of(&self, roles: &[Role]) -> bool {
        roles.contains(self)
    }
}

impl AlertStatus {
    /// Statuses a reviewer may move an alert to.
    pub const REVIEWABLE: &'static [AlertStatus] = &[
        AlertStatus::Acknowledged,
        AlertStatus::Resolved,
        AlertStatus::FalsePositive,
    ];

    pub fn closes_alert(&self) -> bool {
        matches!(self, Self::Resolved | Self::FalsePositive)
    }
}

impl ApplicationStatus {
    pub const REVIEWABLE: &'static [ApplicationStatus] =
        &[ApplicationStatus::Approved, ApplicationStatus::Rejected];
}
