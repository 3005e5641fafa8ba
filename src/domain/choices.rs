//! Closed sets of values stored as text columns.
//!
//! Each enum serializes to the same upper-case token that is written to the
//! database, so API payloads and rows agree.

use super::AppError;

macro_rules! choices {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $value:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($value => Ok($name::$variant),)+
                    other => Err(AppError::Validation(format!(
                        "Invalid {}: '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

choices! {
    /// Role of an account on the platform
    Role {
        Student => "STUDENT",
        Author => "AUTHOR",
        Admin => "ADMIN",
    }
}

choices! {
    CourseStatus {
        Draft => "DRAFT",
        Pending => "PENDING",
        Published => "PUBLISHED",
        Rejected => "REJECTED",
        Archived => "ARCHIVED",
    }
}

choices! {
    CourseLevel {
        Beginner => "BEGINNER",
        Intermediate => "INTERMEDIATE",
        Advanced => "ADVANCED",
    }
}

choices! {
    /// Why a one-time code was issued
    OtpPurpose {
        Register => "REGISTER",
        Login => "LOGIN",
    }
}

choices! {
    /// External sign-in providers an account can be linked to
    SocialProvider {
        Google => "GOOGLE",
        Telegram => "TELEGRAM",
    }
}

choices! {
    /// Regional payment providers
    Gateway {
        Click => "CLICK",
        Payme => "PAYME",
        Uzum => "UZUM",
    }
}

choices! {
    TransactionStatus {
        Pending => "PENDING",
        Success => "SUCCESS",
        Failed => "FAILED",
        Refunded => "REFUNDED",
        Cancelled => "CANCELLED",
    }
}

choices! {
    TransactionType {
        CoursePurchase => "COURSE_PURCHASE",
        Refund => "REFUND",
        AuthorPayout => "AUTHOR_PAYOUT",
    }
}

choices! {
    RefundStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Completed => "COMPLETED",
    }
}

choices! {
    PayoutStatus {
        Pending => "PENDING",
        Processing => "PROCESSING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Rejected => "REJECTED",
    }
}

choices! {
    PayoutMethod {
        BankTransfer => "BANK_TRANSFER",
        Click => "CLICK",
        Payme => "PAYME",
        Uzum => "UZUM",
    }
}

choices! {
    ModerationStatus {
        Pending => "PENDING",
        InReview => "IN_REVIEW",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        ChangesRequested => "CHANGES_REQUESTED",
    }
}

choices! {
    UserAction {
        Ban => "BAN",
        Unban => "UNBAN",
        Warning => "WARNING",
        Suspend => "SUSPEND",
    }
}

choices! {
    BanReason {
        Spam => "SPAM",
        Harassment => "HARASSMENT",
        Fraud => "FRAUD",
        Violation => "VIOLATION",
        Copyright => "COPYRIGHT",
        Other => "OTHER",
    }
}

choices! {
    /// Audit log categories for admin actions
    ActionType {
        CourseApproved => "COURSE_APPROVED",
        CourseRejected => "COURSE_REJECTED",
        UserBanned => "USER_BANNED",
        UserUnbanned => "USER_UNBANNED",
        PayoutApproved => "PAYOUT_APPROVED",
        PayoutRejected => "PAYOUT_REJECTED",
        RefundApproved => "REFUND_APPROVED",
        RefundRejected => "REFUND_REJECTED",
        ConfigChanged => "CONFIG_CHANGED",
        Other => "OTHER",
    }
}
