//! Basic Flock simulation: one user fetches a README and expects a 200 response.
//!
//! Run with `cargo run --example basic_simulation`, passing `-h` after `--` to see all
//! run-time options.
//!
//! ## License
//!
//! Copyright 2020-2026 Jeremy Andrews
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! you may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//! http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

use flock::prelude::*;

struct BasicSimulation;

impl Simulation for BasicSimulation {
    fn set_up(&self, registry: &mut Registry) -> Result<WorkloadHandle, FlockError> {
        let scn = scenario("Basic Example")?.exec(
            http("Get README.md")?
                .get("https://raw.githubusercontent.com/steadybit/extension-gatling/refs/heads/main/README.md")?
                .check(status().is(200)?),
        );

        registry.set_up(vec![scn.inject_open(vec![at_once_users(1)?])?])
    }
}

#[tokio::main]
async fn main() -> Result<(), FlockError> {
    let metrics = Runner::initialize()?
        .execute_simulation(&BasicSimulation)
        .await?;

    if metrics.failed_requests() > 0 {
        std::process::exit(1);
    }

    Ok(())
}
