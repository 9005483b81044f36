use super::models::{Guami, PlmnId, Snssai, Tai};
use anyhow::{Result, ensure};
use serde::Deserialize;
use slog::{Logger, error, info};
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Human readable AMF name
    pub name: String,

    // PLMN
    #[serde(with = "hex")]
    pub plmn: PlmnId,

    // The one served GUAMI.
    pub guami: Guami,

    // Serving network name used in 5G AKA, e.g. "5G:mnc093.mcc208.3gppnetwork.org".
    pub serving_network_name: String,

    // Tracking areas this AMF serves.  Also used as the registration area.
    pub supported_tai_list: Vec<Tai>,

    // Slices supported in the PLMN.
    pub supported_snssai_list: Vec<Snssai>,

    // DNNs offered when the UE does not request one.  The first entry is the default.
    pub support_dnn_list: Vec<String>,

    pub security_algorithm: SecurityAlgorithm,

    #[serde(default)]
    pub network_feature_support_5gs: NetworkFeatureSupport5gs,

    // GPRS timer 3 values in seconds signalled in Registration Accept.
    pub t3502_value: u32,
    pub t3512_value: u32,
    pub non_3gpp_deregistration_timer_value: u32,

    pub t3513: TimerConfig,
    pub t3522: TimerConfig,
    pub t3550: TimerConfig,
    pub t3555: TimerConfig,
    pub t3560: TimerConfig,
    pub t3565: TimerConfig,

    // LADN DNN -> tracking areas where it is available.
    #[serde(default)]
    pub ladn_pool: HashMap<String, Vec<Tai>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityAlgorithm {
    // Preference order of NIA algorithm IDs (0 = NIA0, 1 = 128-NIA1, ...).
    pub integrity_order: Vec<u8>,
    // Preference order of NEA algorithm IDs.
    pub ciphering_order: Vec<u8>,
}

/// 5GS network feature support (TS24.501, 9.11.3.5).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkFeatureSupport5gs {
    pub enable: bool,
    pub ims_vo_ps: u8,
    pub emc: u8,
    pub emf: u8,
    pub iwk_n26: u8,
    pub mpsi: u8,
    pub emc_n3: u8,
    pub mcsi: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimerConfig {
    pub enable: bool,
    pub expire_time_ms: u64,
    pub max_retry_times: u32,
}

impl TimerConfig {
    pub fn expire_time(&self) -> Duration {
        Duration::from_millis(self.expire_time_ms)
    }
}

// NIA0 and 128-NIA2.  Ciphering is applied by the NAS codec.
const SUPPORTED_INTEGRITY_ALGORITHMS: [u8; 2] = [0, 2];
const MAX_CIPHERING_ALGORITHM: u8 = 3;

impl Config {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.supported_tai_list.is_empty(),
            "Config must list at least one supported TAI"
        );
        ensure!(
            !self.supported_snssai_list.is_empty(),
            "Config must list at least one supported S-NSSAI"
        );
        ensure!(
            !self.security_algorithm.integrity_order.is_empty()
                && !self.security_algorithm.ciphering_order.is_empty(),
            "Security algorithm preference orders must not be empty"
        );
        for alg in &self.security_algorithm.integrity_order {
            ensure!(
                SUPPORTED_INTEGRITY_ALGORITHMS.contains(alg),
                "Unsupported integrity algorithm {alg}"
            );
        }
        for alg in &self.security_algorithm.ciphering_order {
            ensure!(*alg <= MAX_CIPHERING_ALGORITHM, "Unknown ciphering algorithm {alg}");
        }
        for (name, timer) in [
            ("T3513", &self.t3513),
            ("T3522", &self.t3522),
            ("T3550", &self.t3550),
            ("T3555", &self.t3555),
            ("T3560", &self.t3560),
            ("T3565", &self.t3565),
        ] {
            ensure!(
                !timer.enable || timer.expire_time_ms > 0,
                "{name} is enabled with a zero expiry time"
            );
        }
        Ok(())
    }

    pub fn in_supported_tai_list(&self, tai: &Tai) -> bool {
        self.supported_tai_list.contains(tai)
    }

    pub fn in_plmn_support(&self, snssai: &Snssai) -> bool {
        self.supported_snssai_list.contains(snssai)
    }
}

/// Load and validate the AMF config file.
pub fn load_config_file(filename: &str, logger: &Logger) -> Result<Config> {
    let path = std::env::current_dir()?;
    let contents = fs::read_to_string(filename).inspect_err(|e| {
        error!(
            logger,
            "Failed to load config file {filename} (current directory {}) with error code {e}",
            path.display()
        )
    })?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    info!(
        logger,
        "Loaded config for {} serving {} TAIs from {filename}",
        config.name,
        config.supported_tai_list.len()
    );
    Ok(config)
}

/// A valid config for unit tests.
#[cfg(test)]
pub fn test_config() -> Config {
    toml::from_str(tests::CONFIG).unwrap()
}
