//! Gherkin features driving the step bridge against in-process mocks.
//!
//! Run with:
//!
//! ```bash
//! cargo test --test features
//! ```

use cucumber::{World, gherkin::Step, given, then, when};
use httpsteps::{LocalClient, Scenario, StepArgument, SuiteConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONCURRENCY_LEVEL: usize = 5;

#[derive(World)]
#[world(init = Self::new)]
pub struct HttpStepsWorld {
    scenario: Option<Scenario>,
}

impl std::fmt::Debug for HttpStepsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStepsWorld")
            .field("active", &self.scenario.is_some())
            .finish()
    }
}

impl HttpStepsWorld {
    async fn new() -> Self {
        let config = SuiteConfig::new("http://localhost:8080")
            .with_header("X-Foo", "bar")
            .with_concurrency_level(CONCURRENCY_LEVEL)
            .with_service("some-service", "http://localhost:8081");
        let client = LocalClient::new(config).expect("suite config should be valid");

        Self {
            scenario: Some(client.begin_scenario()),
        }
    }

    async fn forward(&mut self, step: &Step) {
        let argument = step
            .docstring
            .as_ref()
            .map(|doc| StepArgument::Document(doc.clone()))
            .or_else(|| step.table.as_ref().map(|table| StepArgument::Table(table.rows.clone())));

        let scenario = self.scenario.as_mut().expect("scenario should be active");
        if let Err(err) = scenario.run_step(&step.value, argument.as_ref()).await {
            panic!("step `{}` failed: {err}", step.value);
        }
    }

    fn finish(&mut self) {
        if let Some(scenario) = self.scenario.take() {
            if let Err(err) = scenario.finish() {
                panic!("scenario failed:\n{err}");
            }
        }
    }
}

#[given(regex = r"^.+$")]
async fn given_step(world: &mut HttpStepsWorld, step: &Step) {
    world.forward(step).await;
}

#[when(regex = r"^.+$")]
async fn when_step(world: &mut HttpStepsWorld, step: &Step) {
    world.forward(step).await;
}

#[then(regex = r"^.+$")]
async fn then_step(world: &mut HttpStepsWorld, step: &Step) {
    world.forward(step).await;
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::registry()
        .with(httpsteps::bootstrap::env_filter())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();

    HttpStepsWorld::cucumber()
        .max_concurrent_scenarios(1)
        .fail_on_skipped()
        .after(|_feature, _rule, _scenario, _finished, world| {
            Box::pin(async move {
                if let Some(world) = world {
                    world.finish();
                }
            })
        })
        .run_and_exit("tests/features")
        .await;
}
