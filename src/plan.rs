use serde::Serialize;

use crate::domain::{BoundingBox, InitTime, RunParameters};
use crate::error::SrefError;

const RAW_EXT: &str = "grb2";
const CONVERTED_EXT: &str = "nc";

/// Levels requested from the grib filter, in wire order.
const LEVELS: [&str; 5] = [
    "lev_2_m_above_ground",
    "lev_10_m_above_ground",
    "lev_surface",
    "lev_850_mb",
    "lev_mean_sea_level",
];

/// Variables requested from the grib filter, in wire order.
const VARIABLES: [&str; 6] = [
    "var_HGT",
    "var_PRMSL",
    "var_TMP",
    "var_UGRD",
    "var_VGRD",
    "var_APCP",
];

/// One (core, pert) cell of the ensemble grid, resolved to a URL and local names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchTask {
    pub core: String,
    pub pert: String,
    pub url: String,
    pub raw_filename: String,
    pub converted_filename: String,
}

impl FetchTask {
    pub fn label(&self) -> String {
        format!("{}/{}", self.core, self.pert)
    }
}

/// Expands the core x pert grid into tasks, core-major.
pub fn plan(params: &RunParameters) -> Result<Vec<FetchTask>, SrefError> {
    params.validate()?;

    let mut tasks = Vec::with_capacity(params.cores.len() * params.perts.len());
    for core in params.cores.iter() {
        for pert in params.perts.iter() {
            let raw = raw_filename(core, pert);
            tasks.push(FetchTask {
                core: core.to_string(),
                pert: pert.to_string(),
                url: build_url(&params.base_url, &params.init_time, &params.bbox, core, pert),
                converted_filename: converted_filename(&raw),
                raw_filename: raw,
            });
        }
    }
    Ok(tasks)
}

pub fn build_url(
    base_url: &str,
    init_time: &InitTime,
    bbox: &BoundingBox,
    core: &str,
    pert: &str,
) -> String {
    let hour = init_time.hour_stamp();
    let mut query = vec![format!("file=sref_{core}.t{hour}z.pgrb212.{pert}.grib2")];
    query.extend(LEVELS.iter().map(|level| format!("{level}=on")));
    query.extend(VARIABLES.iter().map(|var| format!("{var}=on")));
    query.push("subregion=".to_string());
    query.push(format!("leftlon={}", degrees(bbox.left)));
    query.push(format!("rightlon={}", degrees(bbox.right)));
    query.push(format!("toplat={}", degrees(bbox.top)));
    query.push(format!("bottomlat={}", degrees(bbox.bottom)));
    query.push(format!(
        "dir=%2Fsref.{}%2F{hour}%2Fpgrb_biasc",
        init_time.date_stamp()
    ));
    format!("{base_url}?{}", query.join("&"))
}

pub fn raw_filename(core: &str, pert: &str) -> String {
    format!("sref_{core}_{pert}.{RAW_EXT}")
}

/// Replaces every `grb2` in the raw name with `nc`. Axis members never
/// contain `grb2`, so only the extension is affected.
pub fn converted_filename(raw: &str) -> String {
    raw.replace(RAW_EXT, CONVERTED_EXT)
}

fn degrees(value: f64) -> String {
    format!("{value:.6}")
}
