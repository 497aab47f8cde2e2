//! Build pools of the bundled environments by name.

use crate::{Bandit, BanditConfig, CartPole, CartPoleConfig, Catch, CatchConfig};
use envpool::{EnvPool, EnvSpec, PoolConfig, PoolEnv, PoolError, Result};

/// A pool over any registered environment
pub type DynPool = EnvPool<Box<dyn PoolEnv>>;

struct Entry {
    name: &'static str,
    description: &'static str,
    spec: fn() -> EnvSpec,
    build: fn() -> Box<dyn PoolEnv>,
}

static ENTRIES: &[Entry] = &[
    Entry {
        name: "catch",
        description: "Catch a falling ball with a paddle (10x5 grid)",
        spec: || Catch::spec(&CatchConfig::default()),
        build: || Box::new(Catch::new(CatchConfig::default())),
    },
    Entry {
        name: "cartpole",
        description: "Balance a pole on a moving cart (500 step cap)",
        spec: || CartPole::spec(&CartPoleConfig::default()),
        build: || Box::new(CartPole::new(&CartPoleConfig::default())),
    },
    Entry {
        name: "bandit",
        description: "Four-armed bandit with one-step episodes",
        spec: || Bandit::spec(&BanditConfig::default()),
        build: || Box::new(Bandit::new(&BanditConfig::default())),
    },
];

/// Registered environments as `(name, description)`
pub fn list() -> Vec<(&'static str, &'static str)> {
    ENTRIES.iter().map(|e| (e.name, e.description)).collect()
}

fn find(name: &str) -> Result<&'static Entry> {
    ENTRIES
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| PoolError::InvalidConfig(format!("unknown environment '{name}'")))
}

/// Spec of a registered environment
pub fn make_spec(name: &str) -> Result<EnvSpec> {
    find(name).map(|e| (e.spec)())
}

/// Build a pool of `config.num_envs` instances of `name`
pub fn make_pool(name: &str, config: PoolConfig) -> Result<DynPool> {
    let entry = find(name)?;
    tracing::debug!(env = entry.name, num_envs = config.num_envs, "building pool");
    EnvPool::new(config, (entry.spec)(), |_, _| (entry.build)())
}

#[cfg(test)]
mod tests {
    use super::*;
    use envpool::ActionRecord;

    #[test]
    fn test_list_names_every_entry() {
        let names: Vec<_> = list().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["catch", "cartpole", "bandit"]);
    }

    #[test]
    fn test_unknown_name_is_invalid_config() {
        assert!(matches!(
            make_pool("pong", PoolConfig::new(1)),
            Err(PoolError::InvalidConfig(_))
        ));
        assert!(make_spec("pong").is_err());
    }

    #[test]
    fn test_every_entry_runs_in_a_pool() {
        for (name, _) in list() {
            let mut pool = make_pool(name, PoolConfig::new(3).with_threads(2)).unwrap();
            let spec = make_spec(name).unwrap();
            assert_eq!(pool.spec().obs_shape(), spec.obs_shape());

            pool.async_reset().unwrap();
            let ids = pool.recv().unwrap().env_ids();
            let batch = pool
                .step(ids.iter().map(|&id| ActionRecord::discrete(id, 1)).collect())
                .unwrap();
            assert_eq!(batch.len(), 3);
            for view in &batch {
                assert!(view.error().is_none(), "{name}: {:?}", view.error());
                assert_eq!(view.obs().len(), spec.obs_size());
            }
        }
    }

    #[test]
    fn test_bandit_pool_reports_score() {
        let mut pool = make_pool("bandit", PoolConfig::new(1)).unwrap();
        let solution = Bandit::new(&BanditConfig::default()).solution();
        pool.async_reset().unwrap();
        pool.recv().unwrap();

        let batch = pool.step(vec![ActionRecord::discrete(0, solution)]).unwrap();
        let view = batch.get(0).unwrap();
        assert!(view.done());
        assert_eq!(view.info("score"), Some(1.0));
        assert_eq!(view.reward(), 1.0);
    }
}
