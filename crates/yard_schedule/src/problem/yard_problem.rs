use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    error::{ConfigurationError, LookupError},
    utils::enumerate_idx::EnumerateIdx,
};

use super::{
    Distance, Quantity, TimeStep,
    objective_weights::ObjectiveWeights,
    road::{FlowKind, Road, RoadIdx},
    subblock::{Subblock, SubblockIdx},
    vessel::{Vessel, VesselIdx},
    vessel_period::{PeriodIdx, VesselPeriod},
};

/// Containers that must move from the vessel of `origin` to the vessel of
/// `destination` through the yard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transshipment {
    pub origin: PeriodIdx,
    pub destination: PeriodIdx,
    pub quantity: Quantity,
}

/// The read-only instance every schedule is evaluated against.
///
/// Period-by-subblock relations are stored as flat row-major vectors indexed with
/// `period * subblock_count + subblock`.
#[derive(Debug)]
pub struct YardProblem {
    horizon: TimeStep,
    vessels: Vec<Vessel>,
    vessel_periods: Vec<Vec<PeriodIdx>>,
    periods: Vec<VesselPeriod>,
    subblocks: Vec<Subblock>,
    roads: Vec<Road>,
    subblock_capacity: Quantity,

    distances_to: Vec<Distance>,
    distances_from: Vec<Distance>,
    routes_to: Vec<Vec<RoadIdx>>,
    routes_from: Vec<Vec<RoadIdx>>,

    transshipment_matrix: Vec<Quantity>,
    transshipments: Vec<Transshipment>,

    weights: ObjectiveWeights,
}

struct YardProblemParams {
    horizon: TimeStep,
    vessels: Vec<Vessel>,
    subblocks: Vec<Subblock>,
    roads: Vec<Road>,
    subblock_capacity: Quantity,
    distances_to: Vec<Vec<Distance>>,
    distances_from: Vec<Vec<Distance>>,
    routes_to: Option<Vec<Vec<Vec<RoadIdx>>>>,
    routes_from: Option<Vec<Vec<Vec<RoadIdx>>>>,
    transshipments: Vec<Transshipment>,
    weights: ObjectiveWeights,
}

impl YardProblem {
    fn new(params: YardProblemParams) -> Result<Self, ConfigurationError> {
        let horizon = params.horizon;
        if horizon <= 0 {
            return Err(ConfigurationError::NonPositiveHorizon { horizon });
        }

        if params.subblock_capacity == 0 {
            return Err(ConfigurationError::ZeroCapacity("subblock"));
        }

        for road in &params.roads {
            if road.capacity(FlowKind::Load) == 0 {
                return Err(ConfigurationError::ZeroCapacity("road load"));
            }
            if road.capacity(FlowKind::Unload) == 0 {
                return Err(ConfigurationError::ZeroCapacity("road unload"));
            }
        }

        let mut periods = Vec::new();
        let mut vessel_periods = Vec::with_capacity(params.vessels.len());
        for (vessel_id, vessel) in params.vessels.iter().enumerate_idx() {
            let count = vessel.periods_per_horizon(horizon)?;
            let mut ids = Vec::with_capacity(count);
            for occurrence in 0..count {
                let id = PeriodIdx::new(periods.len());
                periods.push(VesselPeriod::new(id, vessel_id, vessel, occurrence, horizon)?);
                ids.push(id);
            }
            vessel_periods.push(ids);
        }

        let period_count = periods.len();
        let subblock_count = params.subblocks.len();

        let distances_to = flatten_distances(
            "distances_to",
            params.distances_to,
            period_count,
            subblock_count,
        )?;
        let distances_from = flatten_distances(
            "distances_from",
            params.distances_from,
            period_count,
            subblock_count,
        )?;
        let routes_to = flatten_routes(
            "routes_to",
            params.routes_to,
            period_count,
            subblock_count,
            params.roads.len(),
        )?;
        let routes_from = flatten_routes(
            "routes_from",
            params.routes_from,
            period_count,
            subblock_count,
            params.roads.len(),
        )?;

        let mut transshipment_matrix = vec![0 as Quantity; period_count * period_count];
        for transshipment in &params.transshipments {
            for period in [transshipment.origin, transshipment.destination] {
                if period.get() >= period_count {
                    return Err(ConfigurationError::TransshipmentPeriodOutOfRange {
                        period,
                        period_count,
                    });
                }
            }

            if transshipment.origin == transshipment.destination {
                return Err(ConfigurationError::SelfTransshipment {
                    period: transshipment.origin,
                });
            }

            if transshipment.quantity == 0 {
                return Err(ConfigurationError::ZeroTransshipment {
                    origin: transshipment.origin,
                    destination: transshipment.destination,
                });
            }

            let total = &mut transshipment_matrix
                [transshipment.origin.get() * period_count + transshipment.destination.get()];
            *total = total.checked_add(transshipment.quantity).ok_or(
                ConfigurationError::TransshipmentOverflow {
                    origin: transshipment.origin,
                    destination: transshipment.destination,
                },
            )?;
        }

        let mut transshipments = Vec::new();
        for (index, &quantity) in transshipment_matrix.iter().enumerate() {
            if quantity == 0 {
                continue;
            }

            let origin = PeriodIdx::new(index / period_count);
            let destination = PeriodIdx::new(index % period_count);
            periods[destination].add_inbound(quantity);
            periods[origin].add_outbound(quantity);
            transshipments.push(Transshipment {
                origin,
                destination,
                quantity,
            });
        }

        Ok(YardProblem {
            horizon,
            vessels: params.vessels,
            vessel_periods,
            periods,
            subblocks: params.subblocks,
            roads: params.roads,
            subblock_capacity: params.subblock_capacity,
            distances_to,
            distances_from,
            routes_to,
            routes_from,
            transshipment_matrix,
            transshipments,
            weights: params.weights,
        })
    }

    pub fn horizon(&self) -> TimeStep {
        self.horizon
    }

    pub fn subblock_capacity(&self) -> Quantity {
        self.subblock_capacity
    }

    pub fn objective_weights(&self) -> &ObjectiveWeights {
        &self.weights
    }

    pub fn vessels(&self) -> &[Vessel] {
        &self.vessels
    }

    pub fn periods(&self) -> &[VesselPeriod] {
        &self.periods
    }

    pub fn subblocks(&self) -> &[Subblock] {
        &self.subblocks
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn period_ids(&self) -> impl Iterator<Item = PeriodIdx> + use<> {
        (0..self.periods.len()).map(PeriodIdx::new)
    }

    pub fn vessel(&self, vessel_id: VesselIdx) -> Result<&Vessel, LookupError> {
        self.vessels
            .get(vessel_id.get())
            .ok_or(LookupError::UnknownVessel(vessel_id))
    }

    pub fn period(&self, period_id: PeriodIdx) -> Result<&VesselPeriod, LookupError> {
        self.periods
            .get(period_id.get())
            .ok_or(LookupError::UnknownPeriod(period_id))
    }

    pub fn subblock(&self, subblock_id: SubblockIdx) -> Result<&Subblock, LookupError> {
        self.subblocks
            .get(subblock_id.get())
            .ok_or(LookupError::UnknownSubblock(subblock_id))
    }

    pub fn road(&self, road_id: RoadIdx) -> Result<&Road, LookupError> {
        self.roads
            .get(road_id.get())
            .ok_or(LookupError::UnknownRoad(road_id))
    }

    /// Periods of one vessel in occurrence order.
    pub fn periods_of_vessel(&self, vessel_id: VesselIdx) -> Result<&[PeriodIdx], LookupError> {
        self.vessel_periods
            .get(vessel_id.get())
            .map(Vec::as_slice)
            .ok_or(LookupError::UnknownVessel(vessel_id))
    }

    pub fn check_time(&self, time: TimeStep) -> Result<(), LookupError> {
        if !(0..self.horizon).contains(&time) {
            return Err(LookupError::TimeOutOfHorizon {
                time,
                horizon: self.horizon,
            });
        }

        Ok(())
    }

    /// Subblocks `period` needs so that all its inbound containers fit.
    pub fn required_subblocks(&self, period_id: PeriodIdx) -> Result<usize, LookupError> {
        Ok(self
            .period(period_id)?
            .required_subblocks(self.subblock_capacity))
    }

    /// Distance from the berth of `period` to `subblock`, travelled by unloads.
    pub fn distance_to(
        &self,
        period_id: PeriodIdx,
        subblock_id: SubblockIdx,
    ) -> Result<Distance, LookupError> {
        Ok(self.distances_to[self.flat_index(period_id, subblock_id)?])
    }

    /// Distance from `subblock` back to the berth of `period`, travelled by loads.
    pub fn distance_from(
        &self,
        period_id: PeriodIdx,
        subblock_id: SubblockIdx,
    ) -> Result<Distance, LookupError> {
        Ok(self.distances_from[self.flat_index(period_id, subblock_id)?])
    }

    pub fn route_to(
        &self,
        period_id: PeriodIdx,
        subblock_id: SubblockIdx,
    ) -> Result<&[RoadIdx], LookupError> {
        Ok(&self.routes_to[self.flat_index(period_id, subblock_id)?])
    }

    pub fn route_from(
        &self,
        period_id: PeriodIdx,
        subblock_id: SubblockIdx,
    ) -> Result<&[RoadIdx], LookupError> {
        Ok(&self.routes_from[self.flat_index(period_id, subblock_id)?])
    }

    pub fn transshipment_quantity(
        &self,
        origin: PeriodIdx,
        destination: PeriodIdx,
    ) -> Result<Quantity, LookupError> {
        self.period(origin)?;
        self.period(destination)?;
        Ok(self.transshipment_matrix[origin.get() * self.periods.len() + destination.get()])
    }

    /// Non-zero transshipments ordered by origin, then destination.
    pub fn transshipments(&self) -> &[Transshipment] {
        &self.transshipments
    }

    pub fn adjacent_subblocks(
        &self,
        subblock_id: SubblockIdx,
    ) -> Result<Vec<SubblockIdx>, LookupError> {
        let subblock = self.subblock(subblock_id)?;
        Ok(self
            .subblocks
            .iter()
            .enumerate_idx()
            .filter(|(_, other)| subblock.is_adjacent_to(other))
            .map(|(id, _)| id)
            .collect())
    }

    fn flat_index(
        &self,
        period_id: PeriodIdx,
        subblock_id: SubblockIdx,
    ) -> Result<usize, LookupError> {
        self.period(period_id)?;
        self.subblock(subblock_id)?;
        Ok(period_id.get() * self.subblocks.len() + subblock_id.get())
    }
}

fn flatten_distances(
    matrix: &'static str,
    rows: Vec<Vec<Distance>>,
    period_count: usize,
    subblock_count: usize,
) -> Result<Vec<Distance>, ConfigurationError> {
    check_rows(matrix, rows.iter().map(Vec::len), rows.len(), period_count, subblock_count)?;

    let mut flat = Vec::with_capacity(period_count * subblock_count);
    for (period, row) in rows.into_iter().enumerate_idx() {
        for (subblock, distance) in row.into_iter().enumerate_idx() {
            if !distance.is_finite() || distance < 0.0 {
                return Err(ConfigurationError::InvalidDistance {
                    matrix,
                    period,
                    subblock,
                });
            }
            flat.push(distance);
        }
    }

    Ok(flat)
}

fn flatten_routes(
    matrix: &'static str,
    rows: Option<Vec<Vec<Vec<RoadIdx>>>>,
    period_count: usize,
    subblock_count: usize,
    road_count: usize,
) -> Result<Vec<Vec<RoadIdx>>, ConfigurationError> {
    let Some(rows) = rows else {
        return Ok(vec![Vec::new(); period_count * subblock_count]);
    };

    check_rows(matrix, rows.iter().map(Vec::len), rows.len(), period_count, subblock_count)?;

    let flat: Vec<Vec<RoadIdx>> = rows.into_iter().flatten().collect();
    if let Some(&road) = flat.iter().flatten().find(|road| road.get() >= road_count) {
        return Err(ConfigurationError::UnknownRoad { road, road_count });
    }

    Ok(flat)
}

fn check_rows(
    matrix: &'static str,
    row_lengths: impl Iterator<Item = usize>,
    row_count: usize,
    period_count: usize,
    subblock_count: usize,
) -> Result<(), ConfigurationError> {
    if row_count != period_count {
        return Err(ConfigurationError::DimensionMismatch {
            matrix,
            expected: period_count,
            actual: row_count,
        });
    }

    for length in row_lengths {
        if length != subblock_count {
            return Err(ConfigurationError::DimensionMismatch {
                matrix,
                expected: subblock_count,
                actual: length,
            });
        }
    }

    Ok(())
}

#[derive(Default)]
pub struct YardProblemBuilder {
    horizon: Option<TimeStep>,
    vessels: Option<Vec<Vessel>>,
    subblocks: Option<Vec<Subblock>>,
    roads: Option<Vec<Road>>,
    subblock_capacity: Option<Quantity>,
    distances_to: Option<Vec<Vec<Distance>>>,
    distances_from: Option<Vec<Vec<Distance>>>,
    routes_to: Option<Vec<Vec<Vec<RoadIdx>>>>,
    routes_from: Option<Vec<Vec<Vec<RoadIdx>>>>,
    transshipments: Vec<Transshipment>,
    weights: Option<ObjectiveWeights>,
}

impl YardProblemBuilder {
    pub fn set_horizon(&mut self, horizon: TimeStep) -> &mut YardProblemBuilder {
        self.horizon = Some(horizon);
        self
    }

    pub fn set_vessels(&mut self, vessels: Vec<Vessel>) -> &mut YardProblemBuilder {
        self.vessels = Some(vessels);
        self
    }

    pub fn add_vessel(&mut self, vessel: Vessel) -> &mut YardProblemBuilder {
        if let Some(vessels) = &mut self.vessels {
            vessels.push(vessel);
        } else {
            self.vessels = Some(vec![vessel]);
        }

        self
    }

    pub fn set_subblocks(&mut self, subblocks: Vec<Subblock>) -> &mut YardProblemBuilder {
        self.subblocks = Some(subblocks);
        self
    }

    pub fn set_roads(&mut self, roads: Vec<Road>) -> &mut YardProblemBuilder {
        self.roads = Some(roads);
        self
    }

    pub fn set_subblock_capacity(&mut self, capacity: Quantity) -> &mut YardProblemBuilder {
        self.subblock_capacity = Some(capacity);
        self
    }

    /// Rows are periods in vessel order, columns are subblocks.
    pub fn set_distances_to(&mut self, distances: Vec<Vec<Distance>>) -> &mut YardProblemBuilder {
        self.distances_to = Some(distances);
        self
    }

    pub fn set_distances_from(&mut self, distances: Vec<Vec<Distance>>) -> &mut YardProblemBuilder {
        self.distances_from = Some(distances);
        self
    }

    pub fn set_routes_to(&mut self, routes: Vec<Vec<Vec<RoadIdx>>>) -> &mut YardProblemBuilder {
        self.routes_to = Some(routes);
        self
    }

    pub fn set_routes_from(&mut self, routes: Vec<Vec<Vec<RoadIdx>>>) -> &mut YardProblemBuilder {
        self.routes_from = Some(routes);
        self
    }

    /// Repeated calls for the same pair accumulate.
    pub fn add_transshipment(
        &mut self,
        origin: PeriodIdx,
        destination: PeriodIdx,
        quantity: Quantity,
    ) -> &mut YardProblemBuilder {
        self.transshipments.push(Transshipment {
            origin,
            destination,
            quantity,
        });
        self
    }

    pub fn set_objective_weights(&mut self, weights: ObjectiveWeights) -> &mut YardProblemBuilder {
        self.weights = Some(weights);
        self
    }

    #[instrument(skip_all, level = "debug")]
    pub fn build(self) -> Result<YardProblem, ConfigurationError> {
        let problem = YardProblem::new(YardProblemParams {
            horizon: self
                .horizon
                .ok_or(ConfigurationError::MissingField("horizon"))?,
            vessels: self.vessels.unwrap_or_default(),
            subblocks: self.subblocks.unwrap_or_default(),
            roads: self.roads.unwrap_or_default(),
            subblock_capacity: self
                .subblock_capacity
                .ok_or(ConfigurationError::MissingField("subblock_capacity"))?,
            distances_to: self
                .distances_to
                .ok_or(ConfigurationError::MissingField("distances_to"))?,
            distances_from: self
                .distances_from
                .ok_or(ConfigurationError::MissingField("distances_from"))?,
            routes_to: self.routes_to,
            routes_from: self.routes_from,
            transshipments: self.transshipments,
            weights: self.weights.unwrap_or_default(),
        })?;

        debug!(
            horizon = problem.horizon,
            periods = problem.periods.len(),
            subblocks = problem.subblocks.len(),
            roads = problem.roads.len(),
            transshipments = problem.transshipments.len(),
            "Built yard problem"
        );

        Ok(problem)
    }
}
