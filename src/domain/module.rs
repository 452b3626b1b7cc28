use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Photovoltaic cell technology.
///
/// Serialized spellings match the catalog wire format (`monoSi`, `cis`, ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CellType {
    #[serde(rename = "monoSi")]
    MonoSi,
    #[serde(rename = "multiSi")]
    MultiSi,
    #[serde(rename = "polySi")]
    PolySi,
    #[serde(rename = "cis")]
    Cis,
    #[serde(rename = "cigs")]
    Cigs,
    #[serde(rename = "cdte")]
    CdTe,
    #[serde(rename = "amorphous")]
    Amorphous,
}

impl CellType {
    /// Accepted spellings, in the order shown to clients.
    pub const NAMES: [&'static str; 7] = [
        "monoSi",
        "multiSi",
        "polySi",
        "cis",
        "cigs",
        "cdte",
        "amorphous",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::MonoSi => "monoSi",
            CellType::MultiSi => "multiSi",
            CellType::PolySi => "polySi",
            CellType::Cis => "cis",
            CellType::Cigs => "cigs",
            CellType::CdTe => "cdte",
            CellType::Amorphous => "amorphous",
        }
    }

    /// Starting diode ideality factor for the reference parameter fit.
    ///
    /// Crystalline silicon runs close to the ideal diode; thin-film
    /// technologies sit noticeably higher.
    pub fn ideality_guess(&self) -> f64 {
        match self {
            CellType::MonoSi => 1.1,
            CellType::MultiSi | CellType::PolySi => 1.2,
            CellType::Cis | CellType::Cigs => 1.5,
            CellType::CdTe => 1.4,
            CellType::Amorphous => 1.8,
        }
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CellType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monoSi" => Ok(Self::MonoSi),
            "multiSi" => Ok(Self::MultiSi),
            "polySi" => Ok(Self::PolySi),
            "cis" => Ok(Self::Cis),
            "cigs" => Ok(Self::Cigs),
            "cdte" => Ok(Self::CdTe),
            "amorphous" => Ok(Self::Amorphous),
            _ => Err(format!("Invalid cell type: {}", s)),
        }
    }
}

/// Stored photovoltaic module nameplate record.
///
/// Electrical values are the STC datasheet ratings. Temperature
/// coefficients are absolute: `kv` in V/°C and `ki` in A/°C; `gamma_pmp`
/// is the power coefficient in %/°C and is carried as catalog data only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PvModule {
    pub id: Uuid,
    pub name: String,
    pub celltype: CellType,
    /// Open-circuit voltage [V]
    pub voc: f64,
    /// Short-circuit current [A]
    pub isc: f64,
    /// Maximum-power voltage [V]
    pub vmp: f64,
    /// Maximum-power current [A]
    pub imp: f64,
    /// Cells in series
    pub ns: i32,
    /// Voc temperature coefficient [V/°C]
    pub kv: f64,
    /// Isc temperature coefficient [A/°C]
    pub ki: f64,
    /// Pmp temperature coefficient [%/°C]
    pub gamma_pmp: f64,
    pub created_at: DateTime<Utc>,
}

/// Partial update to a module record; unset fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModulePatch {
    pub name: Option<String>,
    pub celltype: Option<CellType>,
    pub voc: Option<f64>,
    pub isc: Option<f64>,
    pub vmp: Option<f64>,
    pub imp: Option<f64>,
    pub ns: Option<i32>,
    pub kv: Option<f64>,
    pub ki: Option<f64>,
    pub gamma_pmp: Option<f64>,
}

impl ModulePatch {
    /// Apply the set fields onto an existing record.
    pub fn apply_to(&self, module: &mut PvModule) {
        if let Some(ref name) = self.name {
            module.name = name.clone();
        }
        if let Some(celltype) = self.celltype {
            module.celltype = celltype;
        }
        if let Some(voc) = self.voc {
            module.voc = voc;
        }
        if let Some(isc) = self.isc {
            module.isc = isc;
        }
        if let Some(vmp) = self.vmp {
            module.vmp = vmp;
        }
        if let Some(imp) = self.imp {
            module.imp = imp;
        }
        if let Some(ns) = self.ns {
            module.ns = ns;
        }
        if let Some(kv) = self.kv {
            module.kv = kv;
        }
        if let Some(ki) = self.ki {
            module.ki = ki;
        }
        if let Some(gamma_pmp) = self.gamma_pmp {
            module.gamma_pmp = gamma_pmp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_module() -> PvModule {
        PvModule {
            id: Uuid::new_v4(),
            name: "Standard_Mono_300W".to_string(),
            celltype: CellType::MonoSi,
            voc: 39.7,
            isc: 9.45,
            vmp: 32.9,
            imp: 9.12,
            ns: 60,
            kv: -0.123,
            ki: 0.0047,
            gamma_pmp: -0.35,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cell_type_display() {
        assert_eq!(CellType::MonoSi.to_string(), "monoSi");
        assert_eq!(CellType::CdTe.to_string(), "cdte");
        assert_eq!(CellType::Amorphous.to_string(), "amorphous");
    }

    #[test]
    fn test_cell_type_from_str() {
        assert_eq!("monoSi".parse::<CellType>().unwrap(), CellType::MonoSi);
        assert_eq!("cigs".parse::<CellType>().unwrap(), CellType::Cigs);
        assert!("MONOSI".parse::<CellType>().is_err());
        assert!("perovskite".parse::<CellType>().is_err());
    }

    #[test]
    fn test_cell_type_roundtrip_all_names() {
        for name in CellType::NAMES {
            let parsed: CellType = name.parse().unwrap();
            assert_eq!(parsed.as_str(), name);
        }
    }

    #[test]
    fn test_cell_type_serde_wire_format() {
        let json = serde_json::to_string(&CellType::MultiSi).unwrap();
        assert_eq!(json, "\"multiSi\"");
        let back: CellType = serde_json::from_str("\"cdte\"").unwrap();
        assert_eq!(back, CellType::CdTe);
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut module = sample_module();
        let original_isc = module.isc;

        let patch = ModulePatch {
            name: Some("Renamed".to_string()),
            voc: Some(40.1),
            ..Default::default()
        };
        patch.apply_to(&mut module);

        assert_eq!(module.name, "Renamed");
        assert_eq!(module.voc, 40.1);
        assert_eq!(module.isc, original_isc);
        assert_eq!(module.celltype, CellType::MonoSi);
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let mut module = sample_module();
        let before = module.clone();
        ModulePatch::default().apply_to(&mut module);
        assert_eq!(module, before);
    }
}
