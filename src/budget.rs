use crate::function::FunctionCall;
use crate::types::ToolChoice;
use tracing::info;

pub const DEFAULT_FUNCTION_CALL_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetState {
    Active,
    Disabled,
}

/// Caps the number of tool invocations within one run.
///
/// The transition to [`BudgetState::Disabled`] is one-way until
/// [`CallBudget::reset`]. A limit of zero starts disabled.
#[derive(Debug, Clone)]
pub struct CallBudget {
    limit: usize,
    // Calls executed before this budget was created, for resumed runs.
    prior: usize,
    stack: Vec<FunctionCall>,
    state: BudgetState,
}

impl CallBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            prior: 0,
            stack: Vec::new(),
            state: Self::initial_state(limit),
        }
    }

    /// Budget for a resumed run that already executed `used` calls.
    pub fn resumed(limit: usize, used: usize) -> Self {
        let mut budget = Self::new(limit);
        budget.prior = used;
        if budget.count() >= limit {
            budget.state = BudgetState::Disabled;
        }
        budget
    }

    fn initial_state(limit: usize) -> BudgetState {
        if limit == 0 {
            BudgetState::Disabled
        } else {
            BudgetState::Active
        }
    }

    pub fn state(&self) -> BudgetState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == BudgetState::Active
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn count(&self) -> usize {
        self.prior + self.stack.len()
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.count())
    }

    /// Calls recorded by this budget, oldest first. Calls made before a
    /// resume only show up in [`CallBudget::count`].
    pub fn executed(&self) -> &[FunctionCall] {
        &self.stack
    }

    /// Push an executed call and disable tooling once the limit is reached.
    pub fn record(&mut self, call: FunctionCall) -> BudgetState {
        self.stack.push(call);
        if self.state == BudgetState::Active && self.count() >= self.limit {
            info!(limit = self.limit, "Function call limit reached, disabling tool calls");
            self.state = BudgetState::Disabled;
        }
        self.state
    }

    /// The tool choice to send on the next request.
    pub fn tool_choice(&self, configured: Option<&ToolChoice>) -> Option<ToolChoice> {
        match self.state {
            BudgetState::Disabled => Some(ToolChoice::None),
            BudgetState::Active => configured.cloned(),
        }
    }

    pub fn reset(&mut self) {
        self.prior = 0;
        self.stack.clear();
        self.state = Self::initial_state(self.limit);
    }
}

impl Default for CallBudget {
    fn default() -> Self {
        Self::new(DEFAULT_FUNCTION_CALL_LIMIT)
    }
}
