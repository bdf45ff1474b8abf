//! # Fixed-point resolution
//!
//! A symbol resolves by adopting its first *complete* definition, in
//! `(goal weight, start offset)` order. A definition is complete when none of
//! its parameters is unknown and every borrowed parameter type can itself be
//! resolved. Database symbols only consider their write definitions.
//!
//! Resolving a borrowed type resolves the symbol it comes from first. Each
//! attempt keeps the chain of symbols being resolved; meeting one of them
//! again means the definition waits on itself. The wait is reported as
//! [`Resolution::Blocked`] up the chain, and the symbol at the root of the
//! attempt turns it into a dead verdict, after which its dependents see a
//! dead symbol and fail on their own.
//!
//! A pending verdict that did not depend on the chain is remembered for the
//! rest of the sweep, so each symbol is walked at most once per sweep. After
//! the last sweep, symbols still pending drop their update flag; a later
//! change to anything they borrow from flags them again.

use osiris_compiler_parser::ast::ParameterFlow;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tracing::debug;

use super::{
    DefinitionAccess, ParameterRef, ParameterSource, Symbol, SymbolDefinition, SymbolFlags,
    SymbolKey, SymbolParameter, Symbols,
};
use crate::goal::GoalWeights;
use crate::types::ValueType;

/// Outcome of one resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved,
    /// Waiting on information that may still arrive
    Pending,
    Dead,
    /// Waiting on a symbol already being resolved in this attempt
    Blocked,
}

/// Counters of one [`Symbols::update`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub resolved: usize,
    pub dead: usize,
    pub pending: usize,
    /// Deepest chain of nested resolutions seen
    pub max_depth: usize,
    /// Symbols walked across all sweeps
    pub visits: usize,
}

#[derive(Default)]
struct ResolveContext {
    chain: SmallVec<[SymbolKey; 8]>,
    max_depth: usize,
    visits: usize,
    /// Symbols found pending earlier in this sweep
    pending: FxHashSet<SymbolKey>,
}

#[derive(Default)]
struct Failures {
    pending: bool,
    blocked: bool,
}

type ResolvedParameters = Vec<(ValueType, Option<ParameterRef>)>;

impl Symbol {
    /// Verdict of the last resolution.
    pub fn resolution(&self) -> Resolution {
        if self.is_dead() {
            Resolution::Dead
        } else if self.is_system() || self.resolved.is_some() {
            Resolution::Resolved
        } else {
            Resolution::Pending
        }
    }

    /// Indices of the definitions that may become canonical, best first.
    fn candidates(&self, weights: &GoalWeights) -> Vec<usize> {
        let is_database = self.is_database();
        let mut candidates: Vec<usize> = self
            .definitions
            .iter()
            .enumerate()
            .filter(|(_, d)| !is_database || d.access == DefinitionAccess::Write)
            .map(|(index, _)| index)
            .collect();
        candidates.sort_by_key(|&index| {
            let definition = &self.definitions[index];
            (
                weights.get(&definition.goal).copied().unwrap_or(u32::MAX),
                definition.span.start,
            )
        });
        candidates
    }

    /// Flow annotation at `index`, from the canonical definition if it has
    /// one, else from the first definition stating one.
    fn stated_flow(&self, index: usize, canonical: Option<usize>) -> Option<ParameterFlow> {
        let flow_of = |definition: &SymbolDefinition| {
            definition.parameters.get(index).and_then(|p| p.flow)
        };
        canonical
            .and_then(|canonical| self.definitions.get(canonical))
            .and_then(flow_of)
            .or_else(|| self.definitions.iter().find_map(flow_of))
    }

    fn adopt(&mut self, index: usize, parameters: ResolvedParameters) {
        let names: Vec<_> = self.definitions[index]
            .parameters
            .iter()
            .map(|p| p.name.clone())
            .collect();
        self.parameters = parameters
            .into_iter()
            .zip(names)
            .enumerate()
            .map(|(position, ((ty, from), name))| SymbolParameter {
                name,
                ty,
                flow: self.stated_flow(position, Some(index)),
                from,
            })
            .collect();
        self.resolved = Some(index);
        self.flags.remove(SymbolFlags::DEAD | SymbolFlags::NEEDS_UPDATE);
    }

    /// Per position: the explicit type all definitions agree on, `Unknown` if
    /// none states one and `Invalid` on disagreement.
    fn fall_back(&mut self) {
        let flows: Vec<_> = (0..self.parameters.len())
            .map(|index| self.stated_flow(index, None))
            .collect();
        for ((index, parameter), flow) in self.parameters.iter_mut().enumerate().zip(flows) {
            parameter.flow = flow;
            let mut explicit = self.definitions.iter().filter_map(|d| {
                match d.parameters.get(index).map(|p| &p.source) {
                    Some(ParameterSource::Explicit(ty)) if ty.is_known() => Some(ty),
                    _ => None,
                }
            });
            parameter.ty = match explicit.next() {
                None => ValueType::Unknown,
                Some(first) if explicit.all(|ty| ty == first) => first.clone(),
                Some(_) => ValueType::Invalid,
            };
            parameter.from = None;
        }
        self.resolved = None;
    }

    fn mark_dead(&mut self) {
        self.fall_back();
        self.flags.insert(SymbolFlags::DEAD);
        self.flags.remove(SymbolFlags::NEEDS_UPDATE);
    }
}

impl Symbols {
    /// Resolves every symbol flagged for update.
    ///
    /// Runs one sweep over the flagged symbols, then one more over those that
    /// are still pending, so that results do not depend on sweep order.
    pub fn update(&mut self, weights: &GoalWeights) -> UpdateStats {
        let mut stats = UpdateStats::default();
        for _ in 0..2 {
            let flagged: Vec<SymbolKey> = self
                .symbols
                .values()
                .filter(|symbol| symbol.needs_update())
                .map(|symbol| symbol.key.clone())
                .collect();
            if flagged.is_empty() {
                break;
            }
            let mut context = ResolveContext::default();
            for key in flagged {
                self.resolve(&key, weights, &mut context);
            }
            stats.max_depth = stats.max_depth.max(context.max_depth);
            stats.visits += context.visits;
        }
        for symbol in self.symbols.values_mut() {
            symbol.flags.remove(SymbolFlags::NEEDS_UPDATE);
        }

        for symbol in self.symbols.values().filter(|s| !s.is_system()) {
            match symbol.resolution() {
                Resolution::Resolved => stats.resolved += 1,
                Resolution::Dead => stats.dead += 1,
                Resolution::Pending | Resolution::Blocked => stats.pending += 1,
            }
        }
        debug!(
            "symbol sweep: {} resolved, {} dead, {} pending (depth {})",
            stats.resolved, stats.dead, stats.pending, stats.max_depth
        );
        stats
    }

    fn resolve(
        &mut self,
        key: &SymbolKey,
        weights: &GoalWeights,
        context: &mut ResolveContext,
    ) -> Resolution {
        let Some(symbol) = self.symbols.get(key) else {
            return Resolution::Dead;
        };
        if !symbol.needs_update() {
            return symbol.resolution();
        }
        if context.pending.contains(key) {
            return Resolution::Pending;
        }
        if context.chain.contains(key) {
            return Resolution::Blocked;
        }

        context.visits += 1;
        let candidates = symbol.candidates(weights);
        let requires_writer = symbol.is_database();
        context.chain.push(key.clone());
        context.max_depth = context.max_depth.max(context.chain.len());

        let mut failures = Failures::default();
        let mut adopted = None;
        for &index in &candidates {
            let definition = &self.symbols[key].definitions[index];
            if definition.is_partial {
                failures.pending = true;
                continue;
            }
            let sources: Vec<ParameterSource> = definition
                .parameters
                .iter()
                .map(|p| p.source.clone())
                .collect();
            match self.resolve_parameters(&sources, weights, context) {
                Ok(parameters) => {
                    adopted = Some((index, parameters));
                    break;
                }
                Err(Resolution::Pending) => failures.pending = true,
                Err(Resolution::Blocked) => failures.blocked = true,
                Err(_) => {}
            }
        }
        context.chain.pop();
        let is_root = context.chain.is_empty();

        let Some(symbol) = self.symbols.get_mut(key) else {
            return Resolution::Dead;
        };
        if let Some((index, parameters)) = adopted {
            symbol.adopt(index, parameters);
            return Resolution::Resolved;
        }
        if failures.pending {
            symbol.fall_back();
            if !failures.blocked {
                context.pending.insert(key.clone());
            }
            return Resolution::Pending;
        }
        if failures.blocked && !is_root {
            return Resolution::Blocked;
        }
        if candidates.is_empty() && !requires_writer {
            // Nothing to resolve from until a definition shows up
            symbol.fall_back();
            symbol.flags.remove(SymbolFlags::NEEDS_UPDATE);
            return Resolution::Pending;
        }
        debug!("symbol {key} is dead");
        symbol.mark_dead();
        Resolution::Dead
    }

    fn resolve_parameters(
        &mut self,
        sources: &[ParameterSource],
        weights: &GoalWeights,
        context: &mut ResolveContext,
    ) -> Result<ResolvedParameters, Resolution> {
        let mut parameters = Vec::with_capacity(sources.len());
        for source in sources {
            match source {
                ParameterSource::Explicit(ty) => parameters.push((ty.clone(), None)),
                ParameterSource::Unknown => return Err(Resolution::Pending),
                ParameterSource::Reference(reference) => {
                    match self.resolve(&reference.symbol, weights, context) {
                        Resolution::Resolved => {}
                        other => return Err(other),
                    }
                    let ty = self
                        .symbols
                        .get(&reference.symbol)
                        .and_then(|symbol| symbol.parameters.get(reference.index))
                        .map(|parameter| parameter.ty.clone())
                        .unwrap_or_default();
                    if !ty.is_known() {
                        return Err(Resolution::Pending);
                    }
                    parameters.push((ty, Some(reference.clone())));
                }
            }
        }
        Ok(parameters)
    }
}
