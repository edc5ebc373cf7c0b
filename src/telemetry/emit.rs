use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};
use uuid::Uuid;

pub const SCHEMA_VERSION: &str = "feedview.v1";

#[derive(Debug, Clone, Serialize, Default)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub schema_version: &'static str,
    pub time: DateTime<Utc>,
    pub request_id: Uuid,
    pub op: &'static str,
    pub apply: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl Envelope {
    pub fn plan<T: Serialize>(op: &'static str, plan: &T, meta: Option<Meta>) -> Result<Self, serde_json::Error> {
        Ok(Envelope {
            schema_version: SCHEMA_VERSION,
            time: Utc::now(),
            request_id: Uuid::new_v4(),
            op,
            apply: false,
            plan: Some(serde_json::to_value(plan)?),
            result: None,
            meta,
        })
    }

    pub fn result<T: Serialize>(op: &'static str, result: &T, meta: Option<Meta>) -> Result<Self, serde_json::Error> {
        Ok(Envelope {
            schema_version: SCHEMA_VERSION,
            time: Utc::now(),
            request_id: Uuid::new_v4(),
            op,
            apply: true,
            plan: None,
            result: Some(serde_json::to_value(result)?),
            meta,
        })
    }
}

pub fn print_plan<T: Serialize>(op: &'static str, plan: &T, meta: Option<Meta>) -> Result<()> {
    write_line(&Envelope::plan(op, plan, meta)?)
}

pub fn print_result<T: Serialize>(op: &'static str, result: &T, meta: Option<Meta>) -> Result<()> {
    write_line(&Envelope::result(op, result, meta)?)
}

fn write_line(env: &Envelope) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer(&mut out, env)?;
    writeln!(&mut out)?;
    out.flush()?;
    Ok(())
}
