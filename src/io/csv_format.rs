//! CSV format handling
//!
//! This module owns the replay file formats: the intent input rows and the
//! wallet output rows. Readers delegate conversion here so the sync and async
//! paths parse identically.
//!
//! # Input Format
//!
//! ```text
//! type,rental,item,user,start,end,amount,deposit,status,reason
//! item,,1,10,,,50,,,
//! user,,,20,,,,,,
//! request,1,1,20,2024-06-01,2024-06-03,100,25,,
//! approve,1,,,,,,,,
//! delivery,1,,,,,,,delivered_to_buyer,
//! extend,1,,,,,24,,,
//! damage,1,,,,,10,,,
//! delivery,1,,,,,,,returned_to_seller,
//! withdraw,,,10,,,50,,,
//! ```
//!
//! Only `type` is required in the header; absent columns read as empty.
//! `extend` takes its duration in hours from `amount`. Dates are RFC 3339
//! timestamps or plain `YYYY-MM-DD` days (midnight UTC).
//!
//! # Output Format
//!
//! ```text
//! user,pending,withdrawable,total,earnings,withdrawn
//! 10,0.00,85.00,85.00,85.00,0.00
//! ```

use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::{
    DeliveryStatus, Intent, Interval, ItemId, RentalError, RentalRef, UserId, Wallet,
};

/// One raw row of an intent file
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub rental: Option<RentalRef>,
    #[serde(default)]
    pub item: Option<ItemId>,
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub deposit: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

fn parse_error(message: String) -> RentalError {
    RentalError::Parse {
        line: None,
        message,
    }
}

fn required<T>(value: Option<T>, field: &str, kind: &str) -> Result<T, RentalError> {
    value.ok_or_else(|| parse_error(format!("'{}' intent requires {}", kind, field)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_amount(value: Option<String>, field: &str, kind: &str) -> Result<Option<Decimal>, RentalError> {
    match non_empty(value) {
        Some(raw) => Decimal::from_str(&raw)
            .map(Some)
            .map_err(|_| parse_error(format!("invalid {} '{}' for '{}' intent", field, raw, kind))),
        None => Ok(None),
    }
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` day
pub fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, RentalError> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| parse_error(format!("invalid date '{}'", raw)))
}

/// Convert a raw row into an intent
///
/// # Returns
///
/// * `Ok(Intent)` - The row is well formed
/// * `Err(RentalError::Parse)` - Unknown type, missing field or unparsable value
pub fn convert_csv_record(record: CsvRecord) -> Result<Intent, RentalError> {
    let kind = record.kind.trim().to_lowercase();
    let kind = kind.as_str();
    let amount = parse_amount(record.amount, "amount", kind)?;

    let intent = match kind {
        "user" => Intent::RegisterUser {
            user: required(record.user, "a user", kind)?,
        },
        "item" => Intent::ListItem {
            item: required(record.item, "an item", kind)?,
            owner: required(record.user, "an owner user", kind)?,
            price: amount.unwrap_or(Decimal::ZERO),
        },
        "request" => {
            let start = parse_datetime(&required(non_empty(record.start), "a start", kind)?)?;
            let end = parse_datetime(&required(non_empty(record.end), "an end", kind)?)?;
            Intent::Request {
                rental: required(record.rental, "a rental", kind)?,
                item: required(record.item, "an item", kind)?,
                renter: required(record.user, "a renter user", kind)?,
                interval: Interval::new(start, end)
                    .map_err(|e| parse_error(e.to_string()))?,
                total_amount: required(amount, "an amount", kind)?,
                security_deposit: parse_amount(record.deposit, "deposit", kind)?
                    .unwrap_or(Decimal::ZERO),
            }
        }
        "approve" => Intent::Approve {
            rental: required(record.rental, "a rental", kind)?,
        },
        "reject" => Intent::Reject {
            rental: required(record.rental, "a rental", kind)?,
            reason: non_empty(record.reason),
        },
        "delivery" => Intent::Delivery {
            rental: required(record.rental, "a rental", kind)?,
            status: DeliveryStatus::from_str(&required(
                non_empty(record.status),
                "a status",
                kind,
            )?)
            .map_err(|e| parse_error(e.to_string()))?,
        },
        "cancel" => Intent::Cancel {
            rental: required(record.rental, "a rental", kind)?,
            reason: non_empty(record.reason),
        },
        "extend" => {
            let hours = required(amount, "an amount in hours", kind)?;
            let additional = hours
                .checked_mul(Decimal::from(3600))
                .and_then(|seconds| seconds.trunc().to_i64())
                .and_then(Duration::try_seconds)
                .ok_or_else(|| parse_error(format!("invalid extension of {} hours", hours)))?;
            Intent::Extend {
                rental: required(record.rental, "a rental", kind)?,
                additional,
            }
        }
        "damage" => Intent::Damage {
            rental: required(record.rental, "a rental", kind)?,
            amount: required(amount, "an amount", kind)?,
        },
        "complete" => Intent::Complete {
            rental: required(record.rental, "a rental", kind)?,
        },
        "hold" => Intent::Hold {
            rental: required(record.rental, "a rental", kind)?,
        },
        "withdraw" => Intent::Withdraw {
            user: required(record.user, "a user", kind)?,
            amount: required(amount, "an amount", kind)?,
        },
        other => return Err(parse_error(format!("invalid intent type '{}'", other))),
    };

    Ok(intent)
}

/// Write wallets as CSV, sorted by user id, amounts to 2 decimal places
pub fn write_wallets_csv(wallets: &[Wallet], output: &mut dyn Write) -> Result<(), RentalError> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer.write_record([
        "user",
        "pending",
        "withdrawable",
        "total",
        "earnings",
        "withdrawn",
    ])?;

    let mut sorted = wallets.to_vec();
    sorted.sort_by_key(|wallet| wallet.user);

    for wallet in sorted {
        writer.write_record(&[
            wallet.user.to_string(),
            format!("{:.2}", wallet.pending_balance),
            format!("{:.2}", wallet.withdrawable_balance),
            format!("{:.2}", wallet.total_balance()),
            format!("{:.2}", wallet.total_earnings),
            format!("{:.2}", wallet.total_withdrawn),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
