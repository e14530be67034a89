//! Stable external status codes and localized messages.
//!
//! The mapping from [`ServiceError`] to [`Status`] is pure: the same error
//! kind always yields the same code and text, and no request data ever ends
//! up in a message.

use std::fmt;

use flagplane_core::Violation;

use crate::error::{Conflict, ServiceError};

/// Status codes, named after their gRPC counterparts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Code {
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    Internal,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::Unauthenticated => "UNAUTHENTICATED",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Locale {
    JaJp,
    #[default]
    EnUs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl ServiceError {
    pub fn code(&self) -> Code {
        match self {
            ServiceError::Validation(_) | ServiceError::InvalidCursor | ServiceError::InvalidOrderBy => {
                Code::InvalidArgument
            }
            ServiceError::Unauthenticated => Code::Unauthenticated,
            ServiceError::PermissionDenied => Code::PermissionDenied,
            ServiceError::NotFound => Code::NotFound,
            ServiceError::AlreadyExists(_) => Code::AlreadyExists,
            ServiceError::FailedPrecondition(_) => Code::FailedPrecondition,
            ServiceError::Internal => Code::Internal,
        }
    }

    pub fn status(&self, locale: Locale) -> Status {
        Status {
            code: self.code(),
            message: message(self, locale),
        }
    }
}

#[derive(Debug, Copy, Clone)]
enum Field {
    Id,
    Command,
    Name,
    DeliveryKey,
    Tag,
    FeatureId,
    GoalId,
    Period,
    Email,
    Role,
    Environment,
}

fn field(field: Field, locale: Locale) -> &'static str {
    match locale {
        Locale::JaJp => match field {
            Field::Id => "ID",
            Field::Command => "コマンド",
            Field::Name => "名前",
            Field::DeliveryKey => "配信キー",
            Field::Tag => "タグ",
            Field::FeatureId => "フィーチャーID",
            Field::GoalId => "ゴールID",
            Field::Period => "期間",
            Field::Email => "メールアドレス",
            Field::Role => "ロール",
            Field::Environment => "環境",
        },
        Locale::EnUs => match field {
            Field::Id => "id",
            Field::Command => "command",
            Field::Name => "name",
            Field::DeliveryKey => "delivery key",
            Field::Tag => "tag",
            Field::FeatureId => "feature id",
            Field::GoalId => "goal id",
            Field::Period => "period",
            Field::Email => "email",
            Field::Role => "role",
            Field::Environment => "environment",
        },
    }
}

fn required(f: Field, locale: Locale) -> String {
    match locale {
        Locale::JaJp => format!("{}は必須です", field(f, locale)),
        Locale::EnUs => format!("{} is required", field(f, locale)),
    }
}

fn invalid(f: Field, locale: Locale) -> String {
    match locale {
        Locale::JaJp => format!("不正な{}です", field(f, locale)),
        Locale::EnUs => format!("invalid {}", field(f, locale)),
    }
}

fn duplicated(f: Field, locale: Locale) -> String {
    match locale {
        Locale::JaJp => format!("{}が重複しています", field(f, locale)),
        Locale::EnUs => format!("{} is duplicated", field(f, locale)),
    }
}

fn already_exists(f: Field, locale: Locale) -> String {
    match locale {
        Locale::JaJp => format!("{}はすでに存在します", field(f, locale)),
        Locale::EnUs => format!("{} already exists", field(f, locale)),
    }
}

fn fixed(locale: Locale, ja: &str, en: &str) -> String {
    match locale {
        Locale::JaJp => ja.to_string(),
        Locale::EnUs => en.to_string(),
    }
}

fn violation_message(violation: Violation, locale: Locale) -> String {
    match violation {
        Violation::IdRequired => required(Field::Id, locale),
        Violation::InvalidId => invalid(Field::Id, locale),
        Violation::NoCommand => required(Field::Command, locale),
        Violation::UnsupportedCommand => invalid(Field::Command, locale),
        Violation::NameRequired => required(Field::Name, locale),
        Violation::DeliveryKeyRequired => required(Field::DeliveryKey, locale),
        Violation::TagsRequired => required(Field::Tag, locale),
        Violation::TagDuplicated => duplicated(Field::Tag, locale),
        Violation::FeatureIdRequired => required(Field::FeatureId, locale),
        Violation::GoalIdsRequired | Violation::GoalIdEmpty => required(Field::GoalId, locale),
        Violation::InvalidPeriod => invalid(Field::Period, locale),
        Violation::PeriodTooLong => fixed(locale, "期間が長すぎます", "period is too long"),
        Violation::EmailRequired => required(Field::Email, locale),
        Violation::InvalidEmail => invalid(Field::Email, locale),
        Violation::RoleRequired => required(Field::Role, locale),
        Violation::EnvironmentRequired => required(Field::Environment, locale),
    }
}

fn message(err: &ServiceError, locale: Locale) -> String {
    match err {
        ServiceError::Validation(violation) => violation_message(*violation, locale),
        ServiceError::Unauthenticated => fixed(locale, "認証されていません", "unauthenticated"),
        ServiceError::PermissionDenied => fixed(locale, "権限がありません", "permission denied"),
        ServiceError::NotFound => fixed(locale, "データが見つかりません", "not found"),
        ServiceError::AlreadyExists(conflict) => {
            let f = match conflict {
                Conflict::Id => Field::Id,
                Conflict::Tag => Field::Tag,
                Conflict::DeliveryKey => Field::DeliveryKey,
                Conflict::Email => Field::Email,
            };
            already_exists(f, locale)
        }
        ServiceError::FailedPrecondition(_) => fixed(
            locale,
            "現在の状態では実行できません",
            "the operation is not allowed in the current state",
        ),
        ServiceError::InvalidCursor => fixed(locale, "不正なcursorです", "invalid cursor"),
        ServiceError::InvalidOrderBy => fixed(locale, "不正なソート順の指定です", "invalid order by"),
        ServiceError::Internal => fixed(locale, "内部エラーが発生しました", "internal error"),
    }
}
