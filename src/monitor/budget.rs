use crate::format::format_dollars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetPeriod {
    Daily,
    Monthly,
}

impl BudgetPeriod {
    fn label(&self) -> &'static str {
        match self {
            BudgetPeriod::Daily => "Daily",
            BudgetPeriod::Monthly => "Monthly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetLevel {
    /// Spend reached the alert threshold
    Warning,
    /// Spend reached the budget
    Exceeded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetAlert {
    pub period: BudgetPeriod,
    pub level: BudgetLevel,
    pub spent: f64,
    pub budget: f64,
}

impl BudgetAlert {
    pub fn title(&self) -> String {
        format!("OpenCode {} Budget", self.period.label())
    }

    pub fn message(&self) -> String {
        let spent = format_dollars(self.spent);
        let budget = format_dollars(self.budget);
        match self.level {
            BudgetLevel::Warning => {
                let percent = (self.spent * 100.0 / self.budget).floor() as u64;
                format!(
                    "{} budget at {}% ({} of {})",
                    self.period.label(),
                    percent,
                    spent,
                    budget
                )
            }
            BudgetLevel::Exceeded => format!(
                "{} budget exceeded ({} of {})",
                self.period.label(),
                spent,
                budget
            ),
        }
    }
}

#[derive(Debug, Default)]
struct PeriodState {
    key: String,
    warned: bool,
    exceeded: bool,
}

impl PeriodState {
    fn evaluate(
        &mut self,
        period: BudgetPeriod,
        key: &str,
        spent: f64,
        budget: f64,
        threshold_percent: i64,
    ) -> Option<BudgetAlert> {
        if self.key != key {
            *self = PeriodState {
                key: key.to_string(),
                ..Default::default()
            };
        }
        if budget <= 0.0 {
            return None;
        }

        let level = if spent >= budget {
            if self.exceeded {
                return None;
            }
            self.exceeded = true;
            self.warned = true;
            BudgetLevel::Exceeded
        } else if spent >= budget * threshold_percent as f64 / 100.0 {
            if self.warned {
                return None;
            }
            self.warned = true;
            BudgetLevel::Warning
        } else {
            return None;
        };

        Some(BudgetAlert {
            period,
            level,
            spent,
            budget,
        })
    }
}

/// Edge-triggered budget alerts: each level fires once per day or month
#[derive(Debug)]
pub struct BudgetTracker {
    daily_budget: f64,
    monthly_budget: f64,
    threshold_percent: i64,
    daily: PeriodState,
    monthly: PeriodState,
}

impl BudgetTracker {
    pub fn new(daily_budget: f64, monthly_budget: f64, threshold_percent: i64) -> Self {
        Self {
            daily_budget,
            monthly_budget,
            threshold_percent,
            daily: PeriodState::default(),
            monthly: PeriodState::default(),
        }
    }

    /// Check both periods. `date` and `month` identify the current period;
    /// a new key re-arms that period's alerts.
    pub fn evaluate(
        &mut self,
        date: &str,
        daily_spent: f64,
        month: &str,
        monthly_spent: f64,
    ) -> Vec<BudgetAlert> {
        let daily = self.daily.evaluate(
            BudgetPeriod::Daily,
            date,
            daily_spent,
            self.daily_budget,
            self.threshold_percent,
        );
        let monthly = self.monthly.evaluate(
            BudgetPeriod::Monthly,
            month,
            monthly_spent,
            self.monthly_budget,
            self.threshold_percent,
        );
        daily.into_iter().chain(monthly).collect()
    }
}
