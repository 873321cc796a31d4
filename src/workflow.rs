//! Orchestration of the two compute units.
//!
//! [`StateMachineDefinition`] is the Amazon States Language document the
//! provider runs: a chain of `lambda:invoke` tasks. [`LocalExecution`] walks
//! the same document in-process so the chain can be exercised without the
//! provider, passing each task's output on in the `LambdaInvoke` envelope.

use crate::handlers::{NotificationHandler, PlotHandler};
use crate::models::InvokeResult;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tracing::{error, info};

pub const LAMBDA_INVOKE_RESOURCE: &str = "arn:aws:states:::lambda:invoke";
pub const PLOT_STATE: &str = "PlotLambdaTask";
pub const NOTIFICATION_STATE: &str = "NotificationLambdaTask";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StateMachineDefinition {
    pub start_at: String,
    pub states: BTreeMap<String, State>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "Type")]
pub enum State {
    Task(TaskState),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TaskState {
    pub resource: String,
    pub parameters: InvokeParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub end: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvokeParameters {
    #[serde(rename = "FunctionName")]
    pub function_name: String,
    /// JSONPath selecting the task input; `$` forwards the whole state input.
    #[serde(rename = "Payload.$")]
    pub payload_path: String,
}

/// One step of a sequential chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStep {
    pub state_name: String,
    pub function_name: String,
}

impl TaskStep {
    pub fn new(state_name: &str, function_name: &str) -> Self {
        Self {
            state_name: state_name.to_string(),
            function_name: function_name.to_string(),
        }
    }
}

impl StateMachineDefinition {
    /// Chain `steps` in order; the last one ends the execution.
    pub fn sequential(steps: &[TaskStep]) -> Result<Self> {
        let first = steps
            .first()
            .ok_or_else(|| Error::Workflow("A workflow needs at least one step".to_string()))?;

        let mut states = BTreeMap::new();
        for (i, step) in steps.iter().enumerate() {
            let next = steps.get(i + 1).map(|s| s.state_name.clone());
            let state = State::Task(TaskState {
                resource: LAMBDA_INVOKE_RESOURCE.to_string(),
                parameters: InvokeParameters {
                    function_name: step.function_name.clone(),
                    payload_path: "$".to_string(),
                },
                end: next.is_none(),
                next,
            });
            if states.insert(step.state_name.clone(), state).is_some() {
                return Err(Error::Workflow(format!(
                    "Duplicate state name '{}'",
                    step.state_name
                )));
            }
        }

        Ok(Self {
            start_at: first.state_name.clone(),
            states,
        })
    }

    /// The declared workflow: plot, then notify.
    pub fn plot_then_notify(plot_function: &str, notification_function: &str) -> Self {
        let states = BTreeMap::from([
            (
                PLOT_STATE.to_string(),
                State::Task(TaskState {
                    resource: LAMBDA_INVOKE_RESOURCE.to_string(),
                    parameters: InvokeParameters {
                        function_name: plot_function.to_string(),
                        payload_path: "$".to_string(),
                    },
                    next: Some(NOTIFICATION_STATE.to_string()),
                    end: false,
                }),
            ),
            (
                NOTIFICATION_STATE.to_string(),
                State::Task(TaskState {
                    resource: LAMBDA_INVOKE_RESOURCE.to_string(),
                    parameters: InvokeParameters {
                        function_name: notification_function.to_string(),
                        payload_path: "$".to_string(),
                    },
                    next: None,
                    end: true,
                }),
            ),
        ]);

        Self {
            start_at: PLOT_STATE.to_string(),
            states,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn task(&self, state_name: &str) -> Option<&TaskState> {
        match self.states.get(state_name)? {
            State::Task(task) => Some(task),
        }
    }

    /// Validate the chain and return state names in execution order.
    ///
    /// Every state must be reachable from `StartAt`, each task has exactly one
    /// of `Next`/`End`, every `Next` resolves, and the chain terminates.
    pub fn execution_order(&self) -> Result<Vec<String>> {
        let mut order = Vec::with_capacity(self.states.len());
        let mut seen = HashSet::new();
        let mut current = Some(self.start_at.clone());

        while let Some(name) = current {
            if !seen.insert(name.clone()) {
                return Err(Error::Workflow(format!("Cycle through state '{}'", name)));
            }
            let task = self
                .task(&name)
                .ok_or_else(|| Error::Workflow(format!("State '{}' is not defined", name)))?;

            match (&task.next, task.end) {
                (Some(_), true) => {
                    return Err(Error::Workflow(format!(
                        "State '{}' sets both Next and End",
                        name
                    )))
                }
                (None, false) => {
                    return Err(Error::Workflow(format!(
                        "State '{}' sets neither Next nor End",
                        name
                    )))
                }
                _ => {}
            }
            if task.resource != LAMBDA_INVOKE_RESOURCE {
                return Err(Error::Workflow(format!(
                    "State '{}' uses unsupported resource {}",
                    name, task.resource
                )));
            }

            current = task.next.clone();
            order.push(name);
        }

        if order.len() != self.states.len() {
            let orphans: Vec<&str> = self
                .states
                .keys()
                .filter(|k| !seen.contains(*k))
                .map(String::as_str)
                .collect();
            return Err(Error::Workflow(format!(
                "Unreachable states: {}",
                orphans.join(", ")
            )));
        }

        Ok(order)
    }

    pub fn validate(&self) -> Result<()> {
        self.execution_order().map(|_| ())
    }
}

/// Something a task state can invoke.
#[async_trait]
pub trait TaskInvoker: Send + Sync {
    async fn invoke(&self, input: Value) -> Result<Value>;
}

#[async_trait]
impl TaskInvoker for PlotHandler {
    async fn invoke(&self, input: Value) -> Result<Value> {
        Ok(serde_json::to_value(self.handle(input).await?)?)
    }
}

#[async_trait]
impl TaskInvoker for NotificationHandler {
    async fn invoke(&self, input: Value) -> Result<Value> {
        Ok(serde_json::to_value(self.handle_value(input).await?)?)
    }
}

struct RegisteredTask<'a> {
    invoker: &'a dyn TaskInvoker,
    timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub state_name: String,
    pub output: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub steps: Vec<StepRecord>,
    pub output: Value,
}

/// In-process execution of a [`StateMachineDefinition`].
///
/// Steps run strictly one after another; the first failing step fails the
/// execution and no retries are attempted.
pub struct LocalExecution<'a> {
    definition: &'a StateMachineDefinition,
    tasks: HashMap<String, RegisteredTask<'a>>,
}

impl<'a> LocalExecution<'a> {
    pub fn new(definition: &'a StateMachineDefinition) -> Self {
        Self {
            definition,
            tasks: HashMap::new(),
        }
    }

    /// Bind `function_name` to an invoker, optionally bounded by the function timeout.
    pub fn register(
        mut self,
        function_name: &str,
        invoker: &'a dyn TaskInvoker,
        timeout: Option<Duration>,
    ) -> Self {
        self.tasks
            .insert(function_name.to_string(), RegisteredTask { invoker, timeout });
        self
    }

    pub async fn run(&self, input: Value) -> Result<ExecutionReport> {
        let order = self.definition.execution_order()?;
        let mut steps = Vec::with_capacity(order.len());
        let mut current = input;

        for state_name in order {
            let task = self
                .definition
                .task(&state_name)
                .ok_or_else(|| Error::Invariant(format!("State '{}' vanished", state_name)))?;
            let function_name = &task.parameters.function_name;
            let registered = self.tasks.get(function_name).ok_or_else(|| {
                Error::Workflow(format!(
                    "No invoker registered for function '{}'",
                    function_name
                ))
            })?;

            info!("[{}] Invoking {}", state_name, function_name);
            let invocation = registered.invoker.invoke(current);
            let result = match registered.timeout {
                Some(limit) => tokio::time::timeout(limit, invocation).await.map_err(|_| {
                    Error::Timeout(format!(
                        "{} exceeded {}s in state {}",
                        function_name,
                        limit.as_secs_f64(),
                        state_name
                    ))
                })?,
                None => invocation.await,
            };

            let payload = result.map_err(|e| {
                error!("[{}] Task failed: {}", state_name, e);
                e
            })?;
            info!("[{}] Task succeeded", state_name);

            current = serde_json::to_value(InvokeResult::new(payload))?;
            steps.push(StepRecord {
                state_name,
                output: current.clone(),
            });
        }

        Ok(ExecutionReport {
            steps,
            output: current,
        })
    }
}
