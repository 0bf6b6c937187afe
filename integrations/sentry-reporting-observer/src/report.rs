use std::fmt;

use serde::Deserialize;
use sentry_hub::{Map, Value};

/// Placeholder detail for reports that arrive without a body.
pub const NO_DETAILS: &str = "No details available";

/// An error decoding a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportParseError {
    /// The input is not a well formed report.
    #[error("invalid report: {0}")]
    Json(#[from] serde_json::Error),
}

/// The kinds of reports the integration understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// The page or a worker crashed.
    Crash,
    /// A deprecated feature was used.
    Deprecation,
    /// The user agent intervened, for example by blocking a request.
    Intervention,
}

impl ReportType {
    /// Every known report kind.
    pub const ALL: [ReportType; 3] = [
        ReportType::Crash,
        ReportType::Deprecation,
        ReportType::Intervention,
    ];

    /// The wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Crash => "crash",
            ReportType::Deprecation => "deprecation",
            ReportType::Intervention => "intervention",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a crash report.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashReportBody {
    /// Identifier of the crash.
    pub crash_id: String,
    /// Why the crash happened, e.g. `oom`.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body of a deprecation report.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeprecationReportBody {
    /// Identifier of the deprecated feature.
    pub id: String,
    /// When the feature is expected to go away.
    #[serde(default)]
    pub anticipated_removal: Option<String>,
    /// Human readable description.
    pub message: String,
    /// File the deprecated feature was used from.
    #[serde(default)]
    pub source_file: Option<String>,
    /// Line within `source_file`.
    #[serde(default)]
    pub line_number: Option<u64>,
    /// Column within `source_file`.
    #[serde(default)]
    pub column_number: Option<u64>,
}

/// Body of an intervention report.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionReportBody {
    /// Identifier of the intervention.
    pub id: String,
    /// Human readable description.
    pub message: String,
    /// File that triggered the intervention.
    #[serde(default)]
    pub source_file: Option<String>,
    /// Line within `source_file`.
    #[serde(default)]
    pub line_number: Option<u64>,
    /// Column within `source_file`.
    #[serde(default)]
    pub column_number: Option<u64>,
}

/// The body of a report, one variant per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportBody {
    /// See [`CrashReportBody`].
    Crash(CrashReportBody),
    /// See [`DeprecationReportBody`].
    Deprecation(DeprecationReportBody),
    /// See [`InterventionReportBody`].
    Intervention(InterventionReportBody),
}

fn opt<T: Clone + Into<Value>>(value: &Option<T>) -> Value {
    value.clone().map_or(Value::Null, Into::into)
}

impl ReportBody {
    /// Copies every field of the body into a flat map.
    ///
    /// Keys use the wire names.  Absent optional fields are kept as `null`
    /// so the set of keys only depends on the kind.
    pub fn normalize(&self) -> Map<String, Value> {
        let mut map = Map::new();
        match self {
            ReportBody::Crash(body) => {
                map.insert("crashId".into(), body.crash_id.clone().into());
                map.insert("reason".into(), opt(&body.reason));
            }
            ReportBody::Deprecation(body) => {
                map.insert("id".into(), body.id.clone().into());
                map.insert("anticipatedRemoval".into(), opt(&body.anticipated_removal));
                map.insert("message".into(), body.message.clone().into());
                map.insert("sourceFile".into(), opt(&body.source_file));
                map.insert("lineNumber".into(), opt(&body.line_number));
                map.insert("columnNumber".into(), opt(&body.column_number));
            }
            ReportBody::Intervention(body) => {
                map.insert("id".into(), body.id.clone().into());
                map.insert("message".into(), body.message.clone().into());
                map.insert("sourceFile".into(), opt(&body.source_file));
                map.insert("lineNumber".into(), opt(&body.line_number));
                map.insert("columnNumber".into(), opt(&body.column_number));
            }
        }
        map
    }

    /// The one-line summary used in the captured message.
    ///
    /// Crashes are summarized as `"<crash id> <reason>"`, every other kind
    /// by its message.
    pub fn details(&self) -> String {
        match self {
            ReportBody::Crash(CrashReportBody {
                crash_id,
                reason: Some(reason),
            }) => format!("{} {}", crash_id, reason),
            ReportBody::Crash(CrashReportBody { crash_id, .. }) => crash_id.clone(),
            ReportBody::Deprecation(body) => body.message.clone(),
            ReportBody::Intervention(body) => body.message.clone(),
        }
    }
}

/// A single report delivered by the platform.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawReport")]
pub struct Report {
    /// The kind of report.
    pub ty: ReportType,
    /// The document the report originated from.
    pub url: String,
    /// Kind specific data, if the platform provided any.
    pub body: Option<ReportBody>,
}

impl Report {
    /// Decodes a report from its JSON representation.
    ///
    /// ```
    /// use sentry_reporting_observer::{Report, ReportType};
    ///
    /// let report = Report::from_json(
    ///     r#"{"type": "crash", "url": "https://x", "body": {"crashId": "abc", "reason": "oom"}}"#,
    /// )
    /// .unwrap();
    /// assert_eq!(report.ty, ReportType::Crash);
    /// assert_eq!(report.details(), "abc oom");
    /// ```
    pub fn from_json(json: &str) -> Result<Report, ReportParseError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The one-line summary of this report.
    pub fn details(&self) -> String {
        self.body
            .as_ref()
            .map_or_else(|| NO_DETAILS.to_string(), ReportBody::details)
    }
}

#[derive(Deserialize)]
struct RawReport {
    #[serde(rename = "type")]
    ty: ReportType,
    url: String,
    #[serde(default)]
    body: Option<Value>,
}

impl TryFrom<RawReport> for Report {
    type Error = serde_json::Error;

    fn try_from(raw: RawReport) -> Result<Report, Self::Error> {
        let body = match raw.body {
            None | Some(Value::Null) => None,
            Some(body) => Some(match raw.ty {
                ReportType::Crash => ReportBody::Crash(serde_json::from_value(body)?),
                ReportType::Deprecation => ReportBody::Deprecation(serde_json::from_value(body)?),
                ReportType::Intervention => ReportBody::Intervention(serde_json::from_value(body)?),
            }),
        };
        Ok(Report {
            ty: raw.ty,
            url: raw.url,
            body,
        })
    }
}
