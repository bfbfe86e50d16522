use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SrefError;

pub const NOMADS_FILTER_URL: &str = "http://nomads.ncep.noaa.gov/cgi-bin/filter_srefbc.pl";

/// Synoptic hours at which SREF is initialised.
pub const SREF_CYCLES: [u32; 4] = [3, 9, 15, 21];

pub const SREF_CORES: [&str; 2] = ["arw", "nmb"];

pub const SREF_PERTS: [&str; 13] = [
    "ctl", "n1", "n2", "n3", "n4", "n5", "n6", "p1", "p2", "p3", "p4", "p5", "p6",
];

static MEMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+$").expect("member regex"));

/// Forecast cycle, truncated to the hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InitTime(NaiveDateTime);

impl InitTime {
    pub fn from_ymd_h(year: i32, month: u32, day: u32, hour: u32) -> Result<Self, SrefError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .map(Self)
            .ok_or_else(|| {
                SrefError::InvalidInitTime(format!("{year:04}{month:02}{day:02}{hour:02}"))
            })
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    /// `YYYYMMDD`, as used in the remote directory name.
    pub fn date_stamp(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }

    /// Zero-padded 24-hour cycle, e.g. `03`.
    pub fn hour_stamp(&self) -> String {
        format!("{:02}", self.hour())
    }

    pub fn is_sref_cycle(&self) -> bool {
        SREF_CYCLES.contains(&self.hour())
    }
}

impl fmt::Display for InitTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.date_stamp(), self.hour_stamp())
    }
}

impl FromStr for InitTime {
    type Err = SrefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.len() != 10 || !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(SrefError::InvalidInitTime(value.to_string()));
        }
        NaiveDateTime::parse_from_str(&format!("{trimmed}00"), "%Y%m%d%H%M")
            .map(Self)
            .map_err(|_| SrefError::InvalidInitTime(value.to_string()))
    }
}

impl TryFrom<String> for InitTime {
    type Error = SrefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InitTime> for String {
    fn from(value: InitTime) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl BoundingBox {
    pub fn new(left: f64, right: f64, top: f64, bottom: f64) -> Result<Self, SrefError> {
        let bbox = Self {
            left,
            right,
            top,
            bottom,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Continental United States, the box the SREF subsets were first pulled for.
    pub fn conus() -> Self {
        Self {
            left: -125.5,
            right: -65.5,
            top: 50.0,
            bottom: 24.5,
        }
    }

    pub fn validate(&self) -> Result<(), SrefError> {
        let values = [self.left, self.right, self.top, self.bottom];
        if values.iter().any(|value| !value.is_finite()) {
            return Err(SrefError::InvalidBoundingBox(format!(
                "non-finite coordinate in {self}"
            )));
        }
        if self.left >= self.right {
            return Err(SrefError::InvalidBoundingBox(format!(
                "left {} is not west of right {}",
                self.left, self.right
            )));
        }
        if self.bottom >= self.top {
            return Err(SrefError::InvalidBoundingBox(format!(
                "bottom {} is not south of top {}",
                self.bottom, self.top
            )));
        }
        if self.top > 90.0 || self.bottom < -90.0 {
            return Err(SrefError::InvalidBoundingBox(format!(
                "latitude out of range in {self}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.left, self.right, self.top, self.bottom
        )
    }
}

/// Parses `left,right,top,bottom`.
impl FromStr for BoundingBox {
    type Err = SrefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| SrefError::InvalidBoundingBox(value.to_string()))?;
        match parts.as_slice() {
            [left, right, top, bottom] => Self::new(*left, *right, *top, *bottom),
            _ => Err(SrefError::InvalidBoundingBox(format!(
                "expected 4 comma-separated values, got {value:?}"
            ))),
        }
    }
}

/// Ordered, duplicate-free list of member tokens along one ensemble dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridAxis {
    name: &'static str,
    members: Vec<String>,
}

impl GridAxis {
    /// Members must be lowercase alphanumeric tokens. `grb2` may not appear
    /// inside a member, since the converted filename is derived by replacing
    /// that substring.
    pub fn new<I, S>(name: &'static str, members: I) -> Result<Self, SrefError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = members
            .into_iter()
            .map(|member| {
                let member: String = member.into();
                member.trim().to_lowercase()
            })
            .collect::<Vec<_>>();
        if members.is_empty() {
            return Err(SrefError::EmptyAxis(name));
        }

        let mut seen = HashSet::new();
        for member in &members {
            if !MEMBER_RE.is_match(member) || member.contains("grb2") {
                return Err(SrefError::InvalidAxisMember {
                    axis: name,
                    value: member.clone(),
                });
            }
            if !seen.insert(member.as_str()) {
                return Err(SrefError::DuplicateAxisMember {
                    axis: name,
                    value: member.clone(),
                });
            }
        }

        Ok(Self { name, members })
    }

    pub fn sref_cores() -> Self {
        Self {
            name: "core",
            members: SREF_CORES.iter().map(|core| core.to_string()).collect(),
        }
    }

    pub fn sref_perts() -> Self {
        Self {
            name: "pert",
            members: SREF_PERTS.iter().map(|pert| pert.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    pub init_time: InitTime,
    pub bbox: BoundingBox,
    pub cores: GridAxis,
    pub perts: GridAxis,
    pub base_url: String,
}

impl RunParameters {
    pub fn validate(&self) -> Result<(), SrefError> {
        if !self.init_time.is_sref_cycle() {
            return Err(SrefError::UnsupportedCycle(self.init_time.hour()));
        }
        self.bbox.validate()?;
        if self.cores.is_empty() {
            return Err(SrefError::EmptyAxis(self.cores.name()));
        }
        if self.perts.is_empty() {
            return Err(SrefError::EmptyAxis(self.perts.name()));
        }
        Ok(())
    }
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            init_time: InitTime(
                NaiveDate::from_ymd_opt(2015, 11, 20)
                    .and_then(|date| date.and_hms_opt(21, 0, 0))
                    .unwrap_or_default(),
            ),
            bbox: BoundingBox::conus(),
            cores: GridAxis::sref_cores(),
            perts: GridAxis::sref_perts(),
            base_url: NOMADS_FILTER_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Convert,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "fetch"),
            Stage::Convert => write!(f, "convert"),
        }
    }
}

/// Which of a run's own files are deleted before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPolicy {
    None,
    /// Converted `.nc` outputs only; raw downloads are left in place.
    #[default]
    Converted,
    /// Both `.nc` outputs and `.grb2` downloads.
    All,
}

impl fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupPolicy::None => write!(f, "none"),
            CleanupPolicy::Converted => write!(f, "converted"),
            CleanupPolicy::All => write!(f, "all"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_init_time() {
        let init: InitTime = "2015112021".parse().unwrap();
        assert_eq!(init.date_stamp(), "20151120");
        assert_eq!(init.hour_stamp(), "21");
        assert_eq!(init.to_string(), "2015112021");
    }

    #[test]
    fn init_time_pads_early_cycle() {
        let init = InitTime::from_ymd_h(2020, 1, 2, 3).unwrap();
        assert_eq!(init.hour_stamp(), "03");
        assert!(init.is_sref_cycle());
    }

    #[test]
    fn parse_init_time_invalid() {
        assert_matches!(
            "20151120".parse::<InitTime>(),
            Err(SrefError::InvalidInitTime(_))
        );
        assert_matches!(
            "2015113221".parse::<InitTime>(),
            Err(SrefError::InvalidInitTime(_))
        );
        assert_matches!(
            "2015112025".parse::<InitTime>(),
            Err(SrefError::InvalidInitTime(_))
        );
    }

    #[test]
    fn bbox_ordering() {
        assert!(BoundingBox::new(-125.5, -65.5, 50.0, 24.5).is_ok());
        assert_matches!(
            BoundingBox::new(-65.5, -125.5, 50.0, 24.5),
            Err(SrefError::InvalidBoundingBox(_))
        );
        assert_matches!(
            BoundingBox::new(-125.5, -65.5, 24.5, 50.0),
            Err(SrefError::InvalidBoundingBox(_))
        );
        assert_matches!(
            BoundingBox::new(f64::NAN, -65.5, 50.0, 24.5),
            Err(SrefError::InvalidBoundingBox(_))
        );
    }

    #[test]
    fn parse_bbox() {
        let bbox: BoundingBox = "-125.5, -65.5, 50, 24.5".parse().unwrap();
        assert_eq!(bbox, BoundingBox::conus());
        assert!("1,2,3".parse::<BoundingBox>().is_err());
    }

    #[test]
    fn axis_rejects_bad_members() {
        assert_matches!(
            GridAxis::new("core", Vec::<String>::new()),
            Err(SrefError::EmptyAxis("core"))
        );
        assert_matches!(
            GridAxis::new("pert", ["ctl", "ctl"]),
            Err(SrefError::DuplicateAxisMember { .. })
        );
        assert_matches!(
            GridAxis::new("pert", ["p_1"]),
            Err(SrefError::InvalidAxisMember { .. })
        );
        assert_matches!(
            GridAxis::new("pert", ["xgrb2"]),
            Err(SrefError::InvalidAxisMember { .. })
        );
    }

    #[test]
    fn axis_normalizes_case() {
        let axis = GridAxis::new("core", ["ARW", " nmb "]).unwrap();
        assert_eq!(axis.members(), ["arw", "nmb"]);
    }

    #[test]
    fn default_parameters_are_valid() {
        let params = RunParameters::default();
        params.validate().unwrap();
        assert_eq!(params.init_time.to_string(), "2015112021");
        assert_eq!(params.cores.len(), 2);
        assert_eq!(params.perts.len(), 13);
    }

    #[test]
    fn off_cycle_hour_is_rejected() {
        let params = RunParameters {
            init_time: InitTime::from_ymd_h(2015, 11, 20, 12).unwrap(),
            ..RunParameters::default()
        };
        assert_matches!(params.validate(), Err(SrefError::UnsupportedCycle(12)));
    }
}
