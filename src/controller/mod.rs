//! Simulation orchestration: resolves the module, settles the operating
//! conditions and runs the fit → scale → sweep pipeline.

use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{Config, SimulationConfig};
use crate::domain::{SimulationMode, SimulationOutcome, SimulationRequest};
use crate::repo::{self, ModuleStore, StoreError};
use crate::sdm::{self, IvCurve, SdmError};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("module {0} not found")]
    ModuleNotFound(Uuid),
    #[error(transparent)]
    Sdm(#[from] SdmError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub store: Arc<dyn ModuleStore>,
    pub simulator: Arc<Simulator>,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let store = repo::connect(&cfg).await?;
        let simulator = Arc::new(Simulator::new(cfg.simulation.clone(), store.clone()));
        Ok(Self {
            cfg,
            store,
            simulator,
        })
    }
}

pub struct Simulator {
    cfg: SimulationConfig,
    store: Arc<dyn ModuleStore>,
}

impl Simulator {
    pub fn new(cfg: SimulationConfig, store: Arc<dyn ModuleStore>) -> Self {
        Self { cfg, store }
    }

    /// Run one I-V simulation for a stored module.
    ///
    /// Zero or negative irradiance short-circuits to the flat dark curve;
    /// otherwise the module's nameplate is fitted at reference conditions,
    /// translated to the operating conditions and swept.
    pub async fn simulate(
        &self,
        request: &SimulationRequest,
    ) -> Result<SimulationOutcome, SimulationError> {
        let module = self
            .store
            .get(request.module_id)
            .await?
            .ok_or(SimulationError::ModuleNotFound(request.module_id))?;

        let (mode, irradiance, temperature) = self.resolve_conditions(request);
        info!(
            module_id = %module.id,
            module_name = %module.name,
            %mode,
            irradiance_wm2 = irradiance,
            temperature_c = temperature,
            "running I-V simulation"
        );

        let curve = if irradiance <= 0.0 {
            debug!(voc = module.voc, "zero irradiance, emitting flat curve");
            sdm::flat_curve(module.voc, self.cfg.curve_points)
        } else {
            let reference = sdm::fit_reference_params(&module)?;
            debug!(
                i_l_ref = reference.i_l_ref,
                i_o_ref = reference.i_o_ref,
                a_ref = reference.a_ref,
                r_sh_ref = reference.r_sh_ref,
                r_s = reference.r_s,
                "fitted reference parameters"
            );
            let operating = sdm::scale_to_conditions(&reference, irradiance, temperature)?;
            debug!(
                photocurrent = operating.photocurrent,
                saturation_current = operating.saturation_current,
                n_ns_vth = operating.n_ns_vth,
                r_sh = operating.r_sh,
                "scaled to operating conditions"
            );
            sdm::generate_curve(&operating, self.cfg.curve_points)?
        };

        Ok(assemble(module.id, mode, irradiance, temperature, curve))
    }

    /// Environmental values apply only when the request opts in; absent or
    /// opted-out values fall back to the configured reference conditions.
    /// The reported mode follows the opt-in flag alone.
    fn resolve_conditions(&self, request: &SimulationRequest) -> (SimulationMode, f64, f64) {
        if request.use_environmental_conditions {
            (
                SimulationMode::Environment,
                request
                    .irradiance
                    .unwrap_or(self.cfg.default_irradiance_wm2),
                request
                    .temperature
                    .unwrap_or(self.cfg.default_temperature_c),
            )
        } else {
            (
                SimulationMode::Default,
                self.cfg.default_irradiance_wm2,
                self.cfg.default_temperature_c,
            )
        }
    }
}

fn assemble(
    module_id: Uuid,
    mode: SimulationMode,
    irradiance: f64,
    temperature: f64,
    curve: IvCurve,
) -> SimulationOutcome {
    let iv_curve = curve.points.iter().map(|p| [p.voltage, p.current]).collect();
    let pv_curve = curve.points.iter().map(|p| [p.voltage, p.power]).collect();
    SimulationOutcome {
        module_id,
        mode,
        irradiance,
        temperature,
        iv_curve,
        pv_curve,
        summary: curve.summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CellType, PvModule};
    use crate::repo::MemoryStore;
    use chrono::Utc;

    async fn simulator_with_module() -> (Simulator, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let module = store
            .insert(PvModule {
                id: Uuid::new_v4(),
                name: "Standard Mono 300W".to_string(),
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
            })
            .await
            .unwrap();
        let simulator = Simulator::new(SimulationConfig::default(), store);
        (simulator, module.id)
    }

    fn request(module_id: Uuid) -> SimulationRequest {
        SimulationRequest {
            module_id,
            use_environmental_conditions: false,
            irradiance: None,
            temperature: None,
        }
    }

    #[tokio::test]
    async fn test_unknown_module_is_not_found() {
        let (simulator, _) = simulator_with_module().await;
        let missing = Uuid::new_v4();
        let err = simulator.simulate(&request(missing)).await.unwrap_err();
        assert!(matches!(err, SimulationError::ModuleNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_default_mode_uses_reference_conditions() {
        let (simulator, id) = simulator_with_module().await;
        let mut req = request(id);
        // Supplied values must be ignored without the opt-in flag.
        req.irradiance = Some(800.0);
        req.temperature = Some(40.0);
        let outcome = simulator.simulate(&req).await.unwrap();
        assert_eq!(outcome.mode, SimulationMode::Default);
        assert_eq!(outcome.irradiance, 1000.0);
        assert_eq!(outcome.temperature, 25.0);
        assert_eq!(outcome.iv_curve.len(), outcome.pv_curve.len());
        assert!(outcome.summary.p_mp > 0.0);
    }

    #[tokio::test]
    async fn test_environment_mode_uses_supplied_conditions() {
        let (simulator, id) = simulator_with_module().await;
        let mut req = request(id);
        req.use_environmental_conditions = true;
        req.irradiance = Some(800.0);
        req.temperature = Some(40.0);
        let outcome = simulator.simulate(&req).await.unwrap();
        assert_eq!(outcome.mode, SimulationMode::Environment);
        assert_eq!(outcome.irradiance, 800.0);
        assert_eq!(outcome.temperature, 40.0);
    }

    #[tokio::test]
    async fn test_environment_mode_backfills_missing_values() {
        let (simulator, id) = simulator_with_module().await;
        let mut req = request(id);
        req.use_environmental_conditions = true;
        let outcome = simulator.simulate(&req).await.unwrap();
        assert_eq!(outcome.mode, SimulationMode::Environment);
        assert_eq!(outcome.irradiance, 1000.0);
        assert_eq!(outcome.temperature, 25.0);
    }

    #[tokio::test]
    async fn test_zero_irradiance_produces_flat_curve() {
        let (simulator, id) = simulator_with_module().await;
        let mut req = request(id);
        req.use_environmental_conditions = true;
        req.irradiance = Some(0.0);
        let outcome = simulator.simulate(&req).await.unwrap();
        assert!(outcome.iv_curve.iter().all(|p| p[1] == 0.0));
        assert!(outcome.pv_curve.iter().all(|p| p[1] == 0.0));
        assert_eq!(outcome.summary.p_mp, 0.0);
        let last = outcome.iv_curve.last().unwrap();
        assert_eq!(last[0], 39.7);
    }

    #[tokio::test]
    async fn test_power_curve_is_consistent_with_iv() {
        let (simulator, id) = simulator_with_module().await;
        let outcome = simulator.simulate(&request(id)).await.unwrap();
        for (iv, pv) in outcome.iv_curve.iter().zip(outcome.pv_curve.iter()) {
            assert_eq!(iv[0], pv[0]);
            assert!((pv[1] - iv[0] * iv[1]).abs() < 1e-4);
        }
    }
}
