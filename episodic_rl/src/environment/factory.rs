//! Environment construction by registered name.

use crate::config::EnvironmentConfig;
use crate::error::{Result, RlError};
use crate::transforms::{TransformChain, WrapperConfig};

use super::{CartPole, CartPoleConfig, Environment, Space};

const REGISTERED: &[&str] = &["CartPole-v1"];

/// Builds base environments and wraps them in their transform chain.
pub struct EnvironmentFactory;

impl EnvironmentFactory {
    /// Names accepted by [`create`](Self::create).
    pub fn known() -> &'static [&'static str] {
        REGISTERED
    }

    pub fn is_known(name: &str) -> bool {
        REGISTERED.contains(&name)
    }

    /// Observation space `name` declares, without constructing it.
    pub fn observation_space(name: &str) -> Option<Space> {
        match name {
            "CartPole-v1" => Some(CartPole::declared_observation_space()),
            _ => None,
        }
    }

    /// Create the base environment `name` seeded with `seed`.
    pub fn create(name: &str, seed: u64, max_steps: u32) -> Result<Box<dyn Environment>> {
        match name {
            "CartPole-v1" => {
                let config = CartPoleConfig::new()
                    .with_seed(seed)
                    .with_max_steps(max_steps);
                Ok(Box::new(CartPole::new(config)))
            }
            other => Err(RlError::UnknownEnvironment(other.to_string())),
        }
    }

    /// Wrap `env` in the transforms described by `wrappers`.
    pub fn apply_wrappers(
        env: Box<dyn Environment>,
        wrappers: &WrapperConfig,
    ) -> Result<TransformChain> {
        TransformChain::build(env, wrappers)
    }

    /// Create the base environment from `config` and apply its wrappers.
    pub fn from_config(config: &EnvironmentConfig, seed: u64) -> Result<TransformChain> {
        let wrappers = WrapperConfig::from_value(&config.wrappers)?;
        let base = Self::create(&config.env_name, seed, config.max_steps)?;
        let chain = Self::apply_wrappers(base, &wrappers)?;
        log::info!(
            "environment {} (seed {}) with transforms {:?}",
            config.env_name,
            seed,
            chain.applied()
        );
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known() {
        let env = EnvironmentFactory::create("CartPole-v1", 3, 200).unwrap();
        assert_eq!(env.name(), "CartPole-v1");
        assert_eq!(env.observation_space().flat_dim(), 4);
    }

    #[test]
    fn test_declared_space_matches_built_env() {
        let env = EnvironmentFactory::create("CartPole-v1", 0, 10).unwrap();
        assert_eq!(
            EnvironmentFactory::observation_space("CartPole-v1"),
            Some(env.observation_space())
        );
        assert_eq!(EnvironmentFactory::observation_space("Pong-v5"), None);
    }

    #[test]
    fn test_unknown_name() {
        let err = EnvironmentFactory::create("Pong-v5", 0, 100).err().unwrap();
        assert!(matches!(err, RlError::UnknownEnvironment(name) if name == "Pong-v5"));
    }

    #[test]
    fn test_from_config_applies_wrappers() {
        let config = EnvironmentConfig {
            wrappers: serde_yaml::from_str("frame_stack: { enabled: true, num_frames: 3 }\n")
                .unwrap(),
            ..EnvironmentConfig::default()
        };
        let mut chain = EnvironmentFactory::from_config(&config, 7).unwrap();
        assert_eq!(chain.applied(), &["frame_stack"]);
        let (obs, _) = chain.reset().unwrap();
        assert_eq!(obs.len(), 12);
    }

    #[test]
    fn test_same_seed_same_initial_state() {
        let mut a = EnvironmentFactory::create("CartPole-v1", 11, 500).unwrap();
        let mut b = EnvironmentFactory::create("CartPole-v1", 11, 500).unwrap();
        assert_eq!(a.reset().unwrap().0, b.reset().unwrap().0);
    }
}
