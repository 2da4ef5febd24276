use crate::error::ConfigError;
use crate::moves::NUM_KILLER_MOVES;

pub const NMP_DEPTH: i32 = 3;
pub const NMP_VERIFICATION_DEPTH: i32 = 3;
pub const RFP_MARGIN: i32 = 300;
pub const RAZOR_DEPTH: i32 = 3;
pub const RAZOR_MARGIN: i32 = 600;
pub const IID_REDUCTION: i32 = 2;
pub const LMR_MIN_DEPTH: i32 = 3;
pub const LMR_MIN_MOVES: usize = 3;
pub const LMR_REDUCTION: i32 = 1;
pub const ASPIRATION_START_DEPTH: i32 = 2;
pub const MTDF_START_DEPTH: i32 = 2;
pub const CONTEMPT_FACTOR: i32 = 2;
pub const DEFAULT_HASH_SIZE_MB: usize = 64;

/// Every search feature behind its own gate, so any of them can be measured
/// or bisected in isolation. Defaults enable the lot (except the
/// experimental MTD(f) driver).
#[derive(Clone, Debug)]
pub struct Config {
    pub use_alphabeta_pruning: bool,
    pub use_pvs: bool,
    pub use_pvs_ordering: bool,
    pub use_killer_moves: bool,
    pub use_aspiration_window: bool,
    pub aspiration_start_depth: i32,
    pub use_mtdf: bool,
    pub mtdf_start_depth: i32,
    pub use_transposition_table: bool,
    pub use_tt_root: bool,
    pub use_mdp: bool,
    pub use_mpp: bool,
    pub use_rfp: bool,
    pub rfp_margin: i32,
    pub use_nmp: bool,
    pub nmp_depth: i32,
    pub use_verify_nmp: bool,
    pub nmp_verification_depth: i32,
    pub use_razor_pruning: bool,
    pub razor_depth: i32,
    pub razor_margin: i32,
    pub use_iid: bool,
    pub iid_reduction: i32,
    pub use_extensions: bool,
    pub use_limited_razoring: bool,
    pub use_extended_futility_pruning: bool,
    pub use_futility_pruning: bool,
    pub use_lmr: bool,
    pub lmr_min_depth: i32,
    pub lmr_min_moves: usize,
    pub lmr_reduction: i32,
    pub use_quiescence: bool,
    pub use_qfutility_pruning: bool,
    pub use_book: bool,
    pub hash_size_mb: usize,
    pub perft: bool,
    pub contempt_factor: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_alphabeta_pruning: true,
            use_pvs: true,
            use_pvs_ordering: true,
            use_killer_moves: true,
            use_aspiration_window: true,
            aspiration_start_depth: ASPIRATION_START_DEPTH,
            use_mtdf: false,
            mtdf_start_depth: MTDF_START_DEPTH,
            use_transposition_table: true,
            use_tt_root: true,
            use_mdp: true,
            use_mpp: true,
            use_rfp: true,
            rfp_margin: RFP_MARGIN,
            use_nmp: true,
            nmp_depth: NMP_DEPTH,
            use_verify_nmp: true,
            nmp_verification_depth: NMP_VERIFICATION_DEPTH,
            use_razor_pruning: true,
            razor_depth: RAZOR_DEPTH,
            razor_margin: RAZOR_MARGIN,
            use_iid: true,
            iid_reduction: IID_REDUCTION,
            use_extensions: true,
            use_limited_razoring: true,
            use_extended_futility_pruning: true,
            use_futility_pruning: true,
            use_lmr: true,
            lmr_min_depth: LMR_MIN_DEPTH,
            lmr_min_moves: LMR_MIN_MOVES,
            lmr_reduction: LMR_REDUCTION,
            use_quiescence: true,
            use_qfutility_pruning: true,
            use_book: true,
            hash_size_mb: DEFAULT_HASH_SIZE_MB,
            perft: false,
            contempt_factor: CONTEMPT_FACTOR,
        }
    }
}

impl Config {
    /// A configuration with every pruning, ordering and table feature off:
    /// plain full-width negamax, as perft validation requires.
    pub fn all_features_off() -> Self {
        Self {
            use_alphabeta_pruning: false,
            use_pvs: false,
            use_pvs_ordering: false,
            use_killer_moves: false,
            use_aspiration_window: false,
            use_mtdf: false,
            use_transposition_table: false,
            use_tt_root: false,
            use_mdp: false,
            use_mpp: false,
            use_rfp: false,
            use_nmp: false,
            use_verify_nmp: false,
            use_razor_pruning: false,
            use_iid: false,
            use_extensions: false,
            use_limited_razoring: false,
            use_extended_futility_pruning: false,
            use_futility_pruning: false,
            use_lmr: false,
            use_quiescence: false,
            use_qfutility_pruning: false,
            use_book: false,
            ..Default::default()
        }
    }

    /// Contradictory settings are rejected before a search can start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_mtdf && self.use_pvs {
            return Err(ConfigError::MtdfWithPvs);
        }
        Ok(())
    }

    /// Applies one named option. Names follow the engine's canonical
    /// spelling (`USE_NMP`, `RAZOR_MARGIN`, ...); unknown names and
    /// unparsable values are configuration errors.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        fn bool_value(name: &str, value: &str) -> Result<bool, ConfigError> {
            match value.to_ascii_lowercase().as_str() {
                "true" | "on" | "1" => Ok(true),
                "false" | "off" | "0" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    option: name.to_string(),
                    value: value.to_string(),
                }),
            }
        }
        fn int_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
            value.parse().map_err(|_| ConfigError::InvalidValue {
                option: name.to_string(),
                value: value.to_string(),
            })
        }

        match name.to_ascii_uppercase().as_str() {
            "USE_ALPHABETA_PRUNING" => self.use_alphabeta_pruning = bool_value(name, value)?,
            "USE_PVS" => self.use_pvs = bool_value(name, value)?,
            "USE_PVS_ORDERING" => self.use_pvs_ordering = bool_value(name, value)?,
            "USE_KILLER_MOVES" => self.use_killer_moves = bool_value(name, value)?,
            "NO_KILLER_MOVES" => {
                // the killer list capacity is a compile-time constant
                if int_value::<usize>(name, value)? != NUM_KILLER_MOVES {
                    return Err(ConfigError::InvalidValue {
                        option: name.to_string(),
                        value: value.to_string(),
                    });
                }
            }
            "USE_ASPIRATION_WINDOW" => self.use_aspiration_window = bool_value(name, value)?,
            "ASPIRATION_START_DEPTH" => {
                self.aspiration_start_depth = int_value(name, value)?;
            }
            "USE_MTDF" => self.use_mtdf = bool_value(name, value)?,
            "MTDF_START_DEPTH" => self.mtdf_start_depth = int_value(name, value)?,
            "USE_TRANSPOSITION_TABLE" => {
                self.use_transposition_table = bool_value(name, value)?;
            }
            "USE_TT_ROOT" => self.use_tt_root = bool_value(name, value)?,
            "USE_MDP" => self.use_mdp = bool_value(name, value)?,
            "USE_MPP" => self.use_mpp = bool_value(name, value)?,
            "USE_RFP" => self.use_rfp = bool_value(name, value)?,
            "RFP_MARGIN" => self.rfp_margin = int_value(name, value)?,
            "USE_NMP" => self.use_nmp = bool_value(name, value)?,
            "NMP_DEPTH" => self.nmp_depth = int_value(name, value)?,
            "USE_VERIFY_NMP" => self.use_verify_nmp = bool_value(name, value)?,
            "NMP_VERIFICATION_DEPTH" => {
                self.nmp_verification_depth = int_value(name, value)?;
            }
            "USE_RAZOR_PRUNING" => self.use_razor_pruning = bool_value(name, value)?,
            "RAZOR_DEPTH" => self.razor_depth = int_value(name, value)?,
            "RAZOR_MARGIN" => self.razor_margin = int_value(name, value)?,
            "USE_IID" => self.use_iid = bool_value(name, value)?,
            "IID_REDUCTION" => self.iid_reduction = int_value(name, value)?,
            "USE_EXTENSIONS" => self.use_extensions = bool_value(name, value)?,
            "USE_LIMITED_RAZORING" => self.use_limited_razoring = bool_value(name, value)?,
            "USE_EXTENDED_FUTILITY_PRUNING" => {
                self.use_extended_futility_pruning = bool_value(name, value)?;
            }
            "USE_FUTILITY_PRUNING" => self.use_futility_pruning = bool_value(name, value)?,
            "USE_LMR" => self.use_lmr = bool_value(name, value)?,
            "LMR_MIN_DEPTH" => self.lmr_min_depth = int_value(name, value)?,
            "LMR_MIN_MOVES" => self.lmr_min_moves = int_value(name, value)?,
            "LMR_REDUCTION" => self.lmr_reduction = int_value(name, value)?,
            "USE_QUIESCENCE" => self.use_quiescence = bool_value(name, value)?,
            "USE_QFUTILITY_PRUNING" => self.use_qfutility_pruning = bool_value(name, value)?,
            "USE_BOOK" => self.use_book = bool_value(name, value)?,
            "HASH_SIZE" => self.hash_size_mb = int_value(name, value)?,
            "PERFT" => self.perft = bool_value(name, value)?,
            "CONTEMPT_FACTOR" => self.contempt_factor = int_value(name, value)?,
            _ => return Err(ConfigError::UnknownOption(name.to_string())),
        }
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
        assert_eq!(Config::all_features_off().validate(), Ok(()));
    }

    #[test]
    fn mtdf_with_pvs_is_contradictory() {
        let mut config = Config::default();
        assert_eq!(
            config.set_option("USE_MTDF", "true"),
            Err(ConfigError::MtdfWithPvs)
        );
        config.set_option("USE_PVS", "false").unwrap();
        config.set_option("USE_MTDF", "true").unwrap();
        assert!(config.use_mtdf);
    }

    #[test]
    fn unknown_options_are_rejected() {
        let mut config = Config::default();
        assert_eq!(
            config.set_option("USE_WARP_DRIVE", "true"),
            Err(ConfigError::UnknownOption("USE_WARP_DRIVE".to_string()))
        );
    }

    #[test]
    fn values_are_parsed_and_checked() {
        let mut config = Config::default();
        config.set_option("RAZOR_MARGIN", "450").unwrap();
        assert_eq!(config.razor_margin, 450);
        config.set_option("use_nmp", "false").unwrap();
        assert!(!config.use_nmp);
        assert!(config.set_option("NMP_DEPTH", "three").is_err());
        assert!(config.set_option("NO_KILLER_MOVES", "5").is_err());
        config.set_option("NO_KILLER_MOVES", "2").unwrap();
    }
}
