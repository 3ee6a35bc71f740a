//! Error types for scheduling operations.
//!
//! Every broken invariant in the window model, the transition policy, the
//! routing graph or the constraint generator surfaces as a [`SchedulingError`]
//! carrying a structured [`ErrorContext`]. None of these are recovered from
//! inside the crate.

use std::fmt;

/// Result type for scheduling operations
pub type SchedulingResult<T> = Result<T, SchedulingError>;

/// Structured context for scheduling errors.
///
/// Records where an error occurred and which object it concerns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "modify_time", "accumulate_dr")
    pub operation: Option<String>,
    /// The entity type involved (e.g., "window", "route", "satellite")
    pub entity: Option<String>,
    /// The entity ID if applicable
    pub entity_id: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the entity type.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Set the entity ID.
    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(ref id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for scheduling operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulingError {
    /// Unsupported schema version, unknown table key or missing table entry.
    #[error("Configuration error: {message} {context}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// A configured method or a transition branch that has no implementation.
    #[error("Not implemented: {message} {context}")]
    Unimplemented {
        message: String,
        context: ErrorContext,
    },

    /// A satellite could not be mapped to any orbit.
    #[error("Topology lookup failed for satellite {sat_id}: {message} {context}")]
    TopologyLookup {
        sat_id: String,
        message: String,
        context: ErrorContext,
    },

    /// The second activity of a pair does not follow the first in time.
    #[error("Ordering violation: {message} {context}")]
    OrderingViolation {
        message: String,
        context: ErrorContext,
    },

    /// A window-model invariant would be broken by the requested mutation.
    #[error("Window state error: {message} {context}")]
    WindowState {
        message: String,
        context: ErrorContext,
    },

    /// A data route failed validation at a specific window.
    #[error("Route validation failed for {route} at window index {window_index}: {reason} {context}")]
    RouteValidation {
        route: String,
        window_index: usize,
        reason: String,
        context: ErrorContext,
    },

    /// The routes of a multi-route allocate more than a window can carry.
    #[error("Capacity oversubscribed on window {window} in {route}: allocated {allocated} > capacity {capacity} {context}")]
    CapacityOversubscribed {
        route: String,
        window: String,
        allocated: f64,
        capacity: f64,
        context: ErrorContext,
    },

    /// Requested entity was not found.
    #[error("Not found: {message} {context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// The external optimizer proved the formulation infeasible.
    #[error("Solver infeasible: {message} {context}")]
    SolverInfeasible {
        message: String,
        context: ErrorContext,
    },

    /// The external optimizer failed for any other reason.
    #[error("Solver failure: {message} {context}")]
    SolverFailure {
        message: String,
        context: ErrorContext,
    },
}

impl SchedulingError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a configuration error with context.
    pub fn configuration_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Configuration {
            message: message.into(),
            context,
        }
    }

    /// Create an unimplemented-branch error.
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::Unimplemented {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a topology lookup error for the given satellite.
    pub fn topology(sat_id: impl ToString, message: impl Into<String>) -> Self {
        Self::TopologyLookup {
            sat_id: sat_id.to_string(),
            message: message.into(),
            context: ErrorContext::new("orbit_lookup").with_entity("satellite"),
        }
    }

    /// Create an ordering violation error with context.
    pub fn ordering(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::OrderingViolation {
            message: message.into(),
            context,
        }
    }

    /// Create a window state error.
    pub fn window_state(message: impl Into<String>) -> Self {
        Self::WindowState {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a window state error with context.
    pub fn window_state_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::WindowState {
            message: message.into(),
            context,
        }
    }

    /// Create a route validation error naming the offending window index.
    pub fn route_validation(
        route: impl ToString,
        window_index: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::RouteValidation {
            route: route.to_string(),
            window_index,
            reason: reason.into(),
            context: ErrorContext::new("validate").with_entity("route"),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a not found error with context.
    pub fn not_found_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::NotFound {
            message: message.into(),
            context,
        }
    }

    /// Create a solver infeasibility error.
    pub fn infeasible(message: impl Into<String>) -> Self {
        Self::SolverInfeasible {
            message: message.into(),
            context: ErrorContext::new("solve"),
        }
    }

    /// Create a generic solver failure.
    pub fn solver(message: impl Into<String>) -> Self {
        Self::SolverFailure {
            message: message.into(),
            context: ErrorContext::new("solve"),
        }
    }

    /// Get the error context.
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Configuration { context, .. }
            | Self::Unimplemented { context, .. }
            | Self::TopologyLookup { context, .. }
            | Self::OrderingViolation { context, .. }
            | Self::WindowState { context, .. }
            | Self::RouteValidation { context, .. }
            | Self::CapacityOversubscribed { context, .. }
            | Self::NotFound { context, .. }
            | Self::SolverInfeasible { context, .. }
            | Self::SolverFailure { context, .. } => context,
        }
    }

    /// Add or update the operation in the error context.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        match &mut self {
            Self::Configuration { context, .. }
            | Self::Unimplemented { context, .. }
            | Self::TopologyLookup { context, .. }
            | Self::OrderingViolation { context, .. }
            | Self::WindowState { context, .. }
            | Self::RouteValidation { context, .. }
            | Self::CapacityOversubscribed { context, .. }
            | Self::NotFound { context, .. }
            | Self::SolverInfeasible { context, .. }
            | Self::SolverFailure { context, .. } => {
                context.operation = Some(operation.into());
            }
        }
        self
    }

    /// True for configuration and unimplemented-method failures.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Unimplemented { .. })
    }
}
