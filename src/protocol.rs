// 流式通道的帧格式，以及帧里携带的记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

pub const KIND_SENTIMENT: &str = "sentiment";
pub const KIND_ALERT: &str = "alert";

/// 服务端推送的帧: `{"type": ..., "data": {...}, "timestamp"?: number}`
#[derive(Deserialize, Debug, Clone)]
pub struct WireFrame {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub data: Value,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub id: i64,
    pub source: String,
    #[serde(default)]
    pub source_id: Option<String>,
    pub text: String,
    pub sentiment_score: f64,
    pub sentiment_label: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub emotions: HashMap<String, f64>,
    #[serde(default)]
    pub author: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub processed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub severity: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub sentiment_record_id: Option<i64>,
    #[serde(default)]
    pub suggested_response: Option<String>,
    #[serde(default)]
    pub is_resolved: bool,
    pub created_at: String,
    #[serde(default)]
    pub resolved_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub count: u64,
    pub avg_score: f64,
}

/// 统计快照，只从 REST 接口整体刷新，不做增量合并
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total: u64,
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
    pub average_score: f64,
    #[serde(default)]
    pub by_source: HashMap<String, SourceStats>,
}

/// 去重用的事件标识，只由载荷里稳定的字段推导，和接收时间无关
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventIdentity(String);

impl EventIdentity {
    pub fn for_record(kind: &str, id: i64) -> Self {
        Self(format!("{}:{}", kind, id))
    }

    /// `{kind}:{data.id}`，没有标量 id 时退化为 `{kind}#{payload hash}`
    pub fn derive(kind: &str, data: &Value) -> Self {
        match data.get("id") {
            Some(Value::Number(n)) => Self(format!("{}:{}", kind, n)),
            Some(Value::String(s)) => Self(format!("{}:{}", kind, s)),
            _ => {
                // serde_json 的 Map 默认按键排序，序列化结果是稳定的
                let canonical = data.to_string();
                let mut hasher = DefaultHasher::new();
                canonical.hash(&mut hasher);
                Self(format!("{}#{:016x}", kind, hasher.finish()))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Sentiment(SentimentRecord),
    Alert(Alert),
    /// 未识别的类型原样透传
    Other(Value),
}

#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub kind: String,
    pub payload: EventPayload,
    pub identity: EventIdentity,
    pub received_at: DateTime<Utc>,
    /// 服务端附带的发送时间（秒），仅用于日志
    pub emitted_at: Option<f64>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame `{kind}` has a non-object data field")]
    NotAnObject { kind: String },
    #[error("invalid `{kind}` payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 把一条文本帧解码为事件，任何不符合格式的帧都返回 `DecodeError`
pub fn decode_frame(text: &str, received_at: DateTime<Utc>) -> Result<InboundEvent, DecodeError> {
    let frame: WireFrame = serde_json::from_str(text)?;
    if !frame.data.is_object() {
        return Err(DecodeError::NotAnObject { kind: frame.msg_type });
    }

    let identity = EventIdentity::derive(&frame.msg_type, &frame.data);
    let payload = match frame.msg_type.as_str() {
        KIND_SENTIMENT => EventPayload::Sentiment(parse_payload(&frame.msg_type, frame.data)?),
        KIND_ALERT => EventPayload::Alert(parse_payload(&frame.msg_type, frame.data)?),
        _ => EventPayload::Other(frame.data),
    };

    Ok(InboundEvent {
        kind: frame.msg_type,
        payload,
        identity,
        received_at,
        emitted_at: frame.timestamp,
    })
}

fn parse_payload<T: for<'de> Deserialize<'de>>(kind: &str, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::Payload {
        kind: kind.to_string(),
        source,
    })
}
