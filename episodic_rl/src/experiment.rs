//! End-to-end experiment wiring: configuration → environment → agent → trainer.

use crate::agents::{build_agent, Agent, AgentKind};
use crate::checkpoint::{Checkpointer, CheckpointerConfig};
use crate::config::ExperimentConfig;
use crate::environment::{Environment, EnvironmentFactory};
use crate::error::Result;
use crate::metrics::{ConsoleLogger, CsvLogger, MultiLogger};
use crate::runners::{
    EvalResult, OffPolicyStrategy, OnPolicyStrategy, TrainReport, TrainSchedule, Trainer,
    TrainingStrategy,
};
use crate::transforms::TransformChain;

/// What a finished experiment produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSummary {
    pub agent: AgentKind,
    /// Episode index the run started from (non-zero after a resume).
    pub start_episode: u64,
    pub training: Option<TrainReport>,
    pub evaluation: Option<EvalResult>,
}

/// Trainer specialised for the agent's learning protocol.
pub enum ExperimentTrainer {
    OffPolicy(Trainer<OffPolicyStrategy>),
    OnPolicy(Trainer<OnPolicyStrategy>),
}

impl ExperimentTrainer {
    pub fn is_on_policy(&self) -> bool {
        matches!(self, ExperimentTrainer::OnPolicy(_))
    }
}

/// Runs one configured experiment.
pub struct ExperimentRunner {
    config: ExperimentConfig,
}

impl ExperimentRunner {
    /// Validate `config`; nothing is built until [`run`](Self::run).
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn create_environment(&self) -> Result<TransformChain> {
        EnvironmentFactory::from_config(&self.config.environment, self.config.seed)
    }

    pub fn create_agent(&self, env: &TransformChain) -> Result<Box<dyn Agent>> {
        build_agent(
            &self.config.algorithm,
            &env.observation_space(),
            &env.action_space(),
            self.config.seed,
        )
    }

    pub fn schedule(&self) -> TrainSchedule {
        let training = &self.config.training;
        TrainSchedule {
            eval_every: training.eval_every,
            eval_episodes: self.config.evaluation.episodes,
            checkpoint_every: training.checkpoint_every,
            checkpoint_on_final: training.checkpoint_on_final,
        }
    }

    /// Pick the strategy matching the agent: on-policy agents learn from
    /// whole episodes, everything else from the replay buffer.
    pub fn select_trainer(&self, env: TransformChain, agent: Box<dyn Agent>) -> Result<ExperimentTrainer> {
        let algorithm = &self.config.algorithm;
        if agent.on_policy() {
            let trainer = Trainer::new(env, agent, OnPolicyStrategy::new(algorithm));
            Ok(ExperimentTrainer::OnPolicy(self.configure(trainer)?))
        } else {
            let strategy = OffPolicyStrategy::new(algorithm, self.config.seed.wrapping_add(1));
            let trainer = Trainer::new(env, agent, strategy);
            Ok(ExperimentTrainer::OffPolicy(self.configure(trainer)?))
        }
    }

    fn configure<S: TrainingStrategy>(&self, trainer: Trainer<S>) -> Result<Trainer<S>> {
        let training = &self.config.training;
        let mut logger = MultiLogger::new().add(ConsoleLogger::new(training.log_every));
        if let Some(path) = &training.metrics_csv {
            logger = logger.add(CsvLogger::new(path)?);
        }

        let mut trainer = trainer
            .with_logger(logger)
            .with_metrics_window(training.metrics_window)
            .with_config_yaml(self.config.to_yaml_string()?);

        if self.schedule().checkpoint_every.is_some() || training.checkpoint_on_final {
            let checkpointer = Checkpointer::new(
                CheckpointerConfig::new(&training.checkpoint_dir)
                    .with_keep_last_n(training.keep_last_n),
            )?;
            trainer = trainer.with_checkpointer(checkpointer);
        }
        Ok(trainer)
    }

    /// Restore from `evaluation.checkpoint`, else `training.resume_from`.
    ///
    /// Returns the restored episode index, or `None` when nothing is configured.
    pub fn load_checkpoint_if_configured<S: TrainingStrategy>(
        &self,
        trainer: &mut Trainer<S>,
    ) -> Result<Option<u64>> {
        match self.config.checkpoint_to_load() {
            Some(path) => trainer.load_checkpoint(path).map(Some),
            None => Ok(None),
        }
    }

    /// Build everything and run training or evaluation.
    ///
    /// The trainer is closed on every path, including errors.
    pub fn run(&self) -> Result<ExperimentSummary> {
        let env = self.create_environment()?;
        let agent = self.create_agent(&env)?;
        match self.select_trainer(env, agent)? {
            ExperimentTrainer::OffPolicy(trainer) => self.drive(trainer),
            ExperimentTrainer::OnPolicy(trainer) => self.drive(trainer),
        }
    }

    fn drive<S: TrainingStrategy>(&self, mut trainer: Trainer<S>) -> Result<ExperimentSummary> {
        let result = self.execute(&mut trainer);
        trainer.close();
        result
    }

    fn execute<S: TrainingStrategy>(&self, trainer: &mut Trainer<S>) -> Result<ExperimentSummary> {
        let start_episode = self.load_checkpoint_if_configured(trainer)?.unwrap_or(0);
        let mut summary = ExperimentSummary {
            agent: trainer.agent().kind(),
            start_episode,
            training: None,
            evaluation: None,
        };

        if self.config.evaluation.eval_only {
            if self.config.checkpoint_to_load().is_none() {
                log::warn!("evaluation-only run without a checkpoint; evaluating an untrained agent");
            }
            summary.evaluation = Some(trainer.evaluate(self.config.evaluation.episodes)?);
        } else {
            summary.training = Some(trainer.train(self.config.training.episodes, &self.schedule())?);
        }
        Ok(summary)
    }
}
