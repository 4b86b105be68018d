//! Mamdani fuzzy inference over sampled universes
//!
//! Membership functions are sampled on a discrete universe (`start..stop` by
//! `step`). Crisp inputs are clipped to the universe and evaluated by linear
//! interpolation between samples, rules combine with `AND = min` / `OR = max`,
//! consequents are clipped at the rule strength and aggregated with `max`, and
//! the output is the centroid of the piecewise-linear aggregate.
//!
//! ```text
//! let distance = FuzzyVariable::new("distance", Universe::new(0.0, 1500.0, 1.0))?
//!     .with_term("excellent", TriangularMf::new(0.0, 150.0, 350.0)?);
//! let rule = Rule::new(Antecedent::is("distance", "excellent"), "high");
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FuzzyError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Unknown term {term} for variable {variable}")]
    UnknownTerm { variable: String, term: String },
    #[error("Missing crisp input for {0}")]
    MissingInput(String),
    #[error("Empty universe for {0}")]
    EmptyUniverse(String),
    #[error("Invalid triangle [{0}, {1}, {2}]")]
    InvalidTriangle(f64, f64, f64),
    #[error("No rule fired, output cannot be defuzzified")]
    NoActivation,
}

pub type Result<T> = std::result::Result<T, FuzzyError>;

/// Evenly spaced samples `start, start + step, …` strictly below `stop`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Universe {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Universe {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    pub fn samples(&self) -> Vec<f64> {
        if !(self.step > 0.0) || self.stop <= self.start {
            return Vec::new();
        }
        let n = ((self.stop - self.start) / self.step).ceil() as usize;
        (0..n).map(|i| self.start + i as f64 * self.step).collect()
    }
}

/// Triangular membership function with feet `a`, `c` and peak `b`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangularMf {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl TriangularMf {
    pub fn new(a: f64, b: f64, c: f64) -> Result<Self> {
        if !(a <= b && b <= c) {
            return Err(FuzzyError::InvalidTriangle(a, b, c));
        }
        Ok(Self { a, b, c })
    }

    /// Degree of membership of `x`; shoulders (`a == b` or `b == c`) peak at the edge
    pub fn eval(&self, x: f64) -> f64 {
        if x == self.b {
            1.0
        } else if self.a != self.b && self.a < x && x < self.b {
            (x - self.a) / (self.b - self.a)
        } else if self.b != self.c && self.b < x && x < self.c {
            (self.c - x) / (self.c - self.b)
        } else {
            0.0
        }
    }
}

/// A named linguistic term and its sampled membership
#[derive(Debug, Clone)]
pub struct Term {
    pub name: String,
    pub mf: TriangularMf,
    membership: Vec<f64>,
}

/// A linguistic variable: a sampled universe plus its terms
#[derive(Debug, Clone)]
pub struct FuzzyVariable {
    pub name: String,
    samples: Vec<f64>,
    terms: Vec<Term>,
}

impl FuzzyVariable {
    pub fn new(name: impl Into<String>, universe: Universe) -> Result<Self> {
        let name = name.into();
        let samples = universe.samples();
        if samples.is_empty() {
            return Err(FuzzyError::EmptyUniverse(name));
        }
        Ok(Self {
            name,
            samples,
            terms: Vec::new(),
        })
    }

    pub fn with_term(mut self, name: impl Into<String>, mf: TriangularMf) -> Self {
        let membership = self.samples.iter().map(|&x| mf.eval(x)).collect();
        self.terms.push(Term {
            name: name.into(),
            mf,
            membership,
        });
        self
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    fn term(&self, name: &str) -> Result<&Term> {
        self.terms
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| FuzzyError::UnknownTerm {
                variable: self.name.clone(),
                term: name.to_string(),
            })
    }

    /// Degree to which `value` belongs to `term`
    pub fn membership(&self, term: &str, value: f64) -> Result<f64> {
        let term = self.term(term)?;
        Ok(interpolate(&self.samples, &term.membership, value))
    }

    /// Membership of `value` in every term, in declaration order
    pub fn fuzzify(&self, value: f64) -> Vec<(String, f64)> {
        self.terms
            .iter()
            .map(|t| (t.name.clone(), interpolate(&self.samples, &t.membership, value)))
            .collect()
    }

    /// Term with the highest membership for `value` (first wins on ties)
    pub fn dominant_term(&self, value: f64) -> Option<(String, f64)> {
        self.fuzzify(value)
            .into_iter()
            .fold(None, |best: Option<(String, f64)>, (name, mu)| match best {
                Some((_, best_mu)) if best_mu >= mu => best,
                _ => Some((name, mu)),
            })
    }
}

/// Linear interpolation of sampled `ys` at `x`, clipped to the sampled range
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    // First sample strictly greater than x
    let hi = xs.partition_point(|&s| s <= x);
    let lo = hi - 1;
    if xs[lo] == x {
        return ys[lo];
    }
    let slope = (ys[hi] - ys[lo]) / (xs[hi] - xs[lo]);
    slope * (x - xs[lo]) + ys[lo]
}

/// Rule premise: a tree of `variable is term` clauses
#[derive(Debug, Clone, PartialEq)]
pub enum Antecedent {
    Is { variable: String, term: String },
    And(Box<Antecedent>, Box<Antecedent>),
    Or(Box<Antecedent>, Box<Antecedent>),
}

impl Antecedent {
    pub fn is(variable: impl Into<String>, term: impl Into<String>) -> Self {
        Antecedent::Is {
            variable: variable.into(),
            term: term.into(),
        }
    }

    pub fn and(self, other: Antecedent) -> Self {
        Antecedent::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Antecedent) -> Self {
        Antecedent::Or(Box::new(self), Box::new(other))
    }

    fn strength(&self, system: &ControlSystem, inputs: &[(&str, f64)]) -> Result<f64> {
        match self {
            Antecedent::Is { variable, term } => {
                let var = system.input(variable)?;
                let value = inputs
                    .iter()
                    .find(|(name, _)| name == variable)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| FuzzyError::MissingInput(variable.clone()))?;
                var.membership(term, value)
            }
            Antecedent::And(lhs, rhs) => Ok(lhs.strength(system, inputs)?.min(rhs.strength(system, inputs)?)),
            Antecedent::Or(lhs, rhs) => Ok(lhs.strength(system, inputs)?.max(rhs.strength(system, inputs)?)),
        }
    }

    fn check(&self, system: &ControlSystem) -> Result<()> {
        match self {
            Antecedent::Is { variable, term } => system.input(variable)?.term(term).map(|_| ()),
            Antecedent::And(lhs, rhs) | Antecedent::Or(lhs, rhs) => {
                lhs.check(system)?;
                rhs.check(system)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub antecedent: Antecedent,
    /// Output term activated by the rule
    pub consequent: String,
}

impl Rule {
    pub fn new(antecedent: Antecedent, consequent: impl Into<String>) -> Self {
        Self {
            antecedent,
            consequent: consequent.into(),
        }
    }
}

/// Result of one inference
#[derive(Debug, Clone)]
pub struct Inference {
    /// Defuzzified crisp output
    pub output: f64,
    /// Firing strength of each rule, in rule order
    pub rule_strengths: Vec<f64>,
}

/// Rule base with its input and output variables
#[derive(Debug, Clone)]
pub struct ControlSystem {
    inputs: Vec<FuzzyVariable>,
    output: FuzzyVariable,
    rules: Vec<Rule>,
}

impl ControlSystem {
    /// Build a system, checking that every rule references known variables and terms
    pub fn new(inputs: Vec<FuzzyVariable>, output: FuzzyVariable, rules: Vec<Rule>) -> Result<Self> {
        let system = Self { inputs, output, rules };
        for rule in &system.rules {
            rule.antecedent.check(&system)?;
            system.output.term(&rule.consequent)?;
        }
        Ok(system)
    }

    pub fn input(&self, name: &str) -> Result<&FuzzyVariable> {
        self.inputs
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| FuzzyError::UnknownVariable(name.to_string()))
    }

    pub fn output(&self) -> &FuzzyVariable {
        &self.output
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate the rule base for crisp `(variable, value)` inputs
    pub fn compute(&self, inputs: &[(&str, f64)]) -> Result<Inference> {
        let rule_strengths = self
            .rules
            .iter()
            .map(|rule| rule.antecedent.strength(self, inputs))
            .collect::<Result<Vec<f64>>>()?;

        // Each output term is activated by the strongest rule concluding it
        let mut term_strengths = vec![0.0_f64; self.output.terms.len()];
        for (rule, strength) in self.rules.iter().zip(&rule_strengths) {
            if let Some(idx) = self.output.terms.iter().position(|t| t.name == rule.consequent) {
                term_strengths[idx] = term_strengths[idx].max(*strength);
            }
        }

        let aggregated: Vec<f64> = (0..self.output.samples.len())
            .map(|i| {
                self.output
                    .terms
                    .iter()
                    .zip(&term_strengths)
                    .map(|(term, strength)| term.membership[i].min(*strength))
                    .fold(0.0, f64::max)
            })
            .collect();

        let output = centroid(&self.output.samples, &aggregated).ok_or(FuzzyError::NoActivation)?;
        Ok(Inference { output, rule_strengths })
    }
}

/// Centroid of a piecewise-linear membership curve; `None` when its area is zero
pub fn centroid(xs: &[f64], mu: &[f64]) -> Option<f64> {
    let mut moment_area = 0.0;
    let mut total_area = 0.0;

    for i in 1..xs.len().min(mu.len()) {
        let (x1, x2) = (xs[i - 1], xs[i]);
        let (y1, y2) = (mu[i - 1], mu[i]);
        if (y1 == 0.0 && y2 == 0.0) || x1 == x2 {
            continue;
        }
        let width = x2 - x1;
        let (moment, area) = if y1 == y2 {
            // rectangle
            (0.5 * (x1 + x2), width * y1)
        } else if y1 == 0.0 {
            // triangle rising to y2
            (2.0 / 3.0 * width + x1, 0.5 * width * y2)
        } else if y2 == 0.0 {
            // triangle falling from y1
            (1.0 / 3.0 * width + x1, 0.5 * width * y1)
        } else {
            // trapezoid
            ((2.0 / 3.0 * width * (y2 + 0.5 * y1)) / (y1 + y2) + x1, 0.5 * width * (y1 + y2))
        };
        moment_area += moment * area;
        total_area += area;
    }

    (total_area > 0.0).then(|| moment_area / total_area)
}
