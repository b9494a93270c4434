//! Terrain and Environment
//!
//! Agents see the world through the [`Terrain`] trait: neighbouring cells,
//! the resource deposits in a cell, and how long a journey takes. [`HexMap`]
//! is a small in-crate grid used by the host binary and tests.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalogue::{Catalogue, ItemId, VehicleKind};
use crate::state::AgentState;

/// Index of a map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub u32);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Harvestable resource in a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDeposit {
    pub item: ItemId,
    pub amount: f32,
    pub max_amount: f32,
    /// Logistic regrowth per unit of simulated time
    pub replenishment_rate: f32,
}

impl ResourceDeposit {
    pub fn new(item: ItemId, amount: f32, max_amount: f32, replenishment_rate: f32) -> Self {
        let max_amount = max_amount.max(0.0);
        Self {
            item,
            amount: amount.clamp(0.0, max_amount),
            max_amount,
            replenishment_rate,
        }
    }

    /// Logistic regrowth toward `max_amount`. An exhausted deposit stays empty.
    pub fn regrow(&mut self, delta_time: f32) {
        if self.max_amount <= 0.0 || delta_time <= 0.0 {
            return;
        }
        let growth =
            self.replenishment_rate * self.amount * (1.0 - self.amount / self.max_amount) * delta_time;
        self.amount = (self.amount + growth).clamp(0.0, self.max_amount);
    }

    /// Removes up to `amount`, returning what was taken.
    pub fn harvest(&mut self, amount: f32) -> f32 {
        let taken = amount.clamp(0.0, self.amount);
        self.amount -= taken;
        taken
    }

    /// Returns resource to the deposit (recipes may replant).
    pub fn replenish(&mut self, amount: f32) {
        self.amount = (self.amount + amount.max(0.0)).min(self.max_amount);
    }
}

/// Read-only view of the world consumed by planning.
pub trait Terrain {
    fn neighbors(&self, cell: CellId) -> Vec<CellId>;

    fn deposits(&self, cell: CellId) -> &[ResourceDeposit];

    /// Hex steps between two cells.
    fn distance(&self, a: CellId, b: CellId) -> u32;

    /// Travel time between cells for the given per-vehicle speed
    /// multipliers, or `None` when the destination cannot be reached.
    fn time_cost(
        &self,
        origin: CellId,
        destination: CellId,
        speed_multipliers: &[f32; VehicleKind::COUNT],
    ) -> Option<f32>;
}

/// Stable handle for another agent, as seen from a planning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentKey(pub u64);

/// A co-located agent that can be traded with.
#[derive(Debug, Clone)]
pub struct TradePartner {
    pub key: AgentKey,
    /// Snapshot of the partner's state; never mutated by planning
    pub state: AgentState,
}

/// Everything an agent can reach during one planning call.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentContext {
    /// Travellers: their own cell. Settlements: territory plus neighbours.
    pub zone: Vec<CellId>,
    pub partners: Vec<TradePartner>,
}

impl EnvironmentContext {
    pub fn new(zone: Vec<CellId>) -> Self {
        Self {
            zone,
            partners: Vec::new(),
        }
    }

    pub fn with_partners(mut self, partners: Vec<TradePartner>) -> Self {
        self.partners = partners;
        self
    }

    /// The traveller's current cell.
    pub fn current_cell(&self) -> Option<CellId> {
        self.zone.first().copied()
    }

    pub fn partner(&self, key: AgentKey) -> Option<&TradePartner> {
        self.partners.iter().find(|p| p.key == key)
    }

    /// Context of a traveller that has moved to `cell`. Partners stay behind.
    pub fn moved_to(&self, cell: CellId) -> Self {
        Self::new(vec![cell])
    }
}

/// Ground type of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ground {
    Plains,
    Forest,
    Hills,
    Water,
}

impl Ground {
    /// Time to cross one cell on foot.
    pub fn move_cost(self) -> f32 {
        match self {
            Ground::Plains => 1.0,
            Ground::Forest => 1.5,
            Ground::Hills => 2.0,
            Ground::Water => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HexCell {
    pub id: CellId,
    pub ground: Ground,
    pub deposits: Vec<ResourceDeposit>,
}

/// Rectangular map of hex cells in odd-row offset layout.
#[derive(Debug, Clone)]
pub struct HexMap {
    width: u32,
    height: u32,
    cells: Vec<HexCell>,
}

/// Axial neighbour offsets.
const HEX_DIRECTIONS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

impl HexMap {
    /// A map of plains without deposits.
    pub fn flat(width: u32, height: u32) -> Self {
        let cells = (0..width * height)
            .map(|i| HexCell {
                id: CellId(i),
                ground: Ground::Plains,
                deposits: Vec::new(),
            })
            .collect();
        Self {
            width,
            height,
            cells,
        }
    }

    /// A random map with ground types and resource deposits from the catalogue.
    pub fn generate<R: Rng + ?Sized>(
        width: u32,
        height: u32,
        catalogue: &Catalogue,
        rng: &mut R,
    ) -> Self {
        let mut map = Self::flat(width, height);
        let season_duration = catalogue.season_duration();
        for cell in &mut map.cells {
            cell.ground = match rng.gen_range(0..10) {
                0 => Ground::Water,
                1..=3 => Ground::Forest,
                4..=5 => Ground::Hills,
                _ => Ground::Plains,
            };
            if cell.ground == Ground::Water {
                continue;
            }
            for resource in catalogue.resources() {
                if rng.gen::<f32>() < 0.35 {
                    let max = resource.max_amount;
                    let amount = max * rng.gen_range(0.3..1.0);
                    cell.deposits.push(ResourceDeposit::new(
                        resource.id,
                        amount,
                        max,
                        resource.replenishment_rate(season_duration),
                    ));
                }
            }
        }
        map
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, id: CellId) -> Option<&HexCell> {
        self.cells.get(id.0 as usize)
    }

    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut HexCell> {
        self.cells.get_mut(id.0 as usize)
    }

    pub fn cells(&self) -> &[HexCell] {
        &self.cells
    }

    pub fn is_land(&self, id: CellId) -> bool {
        self.cell(id).map_or(false, |c| c.ground != Ground::Water)
    }

    pub fn set_ground(&mut self, id: CellId, ground: Ground) {
        if let Some(cell) = self.cell_mut(id) {
            cell.ground = ground;
        }
    }

    pub fn add_deposit(&mut self, id: CellId, deposit: ResourceDeposit) {
        if let Some(cell) = self.cell_mut(id) {
            match cell.deposits.iter_mut().find(|d| d.item == deposit.item) {
                Some(existing) => existing.replenish(deposit.amount),
                None => cell.deposits.push(deposit),
            }
        }
    }

    /// Takes up to `amount` of `item` from a cell, returning what was taken.
    pub fn harvest(&mut self, id: CellId, item: ItemId, amount: f32) -> f32 {
        self.cell_mut(id)
            .and_then(|c| c.deposits.iter_mut().find(|d| d.item == item))
            .map_or(0.0, |d| d.harvest(amount))
    }

    pub fn replenish(&mut self, id: CellId, item: ItemId, amount: f32, catalogue: &Catalogue) {
        let def = catalogue.item(item);
        let rate = def.replenishment_rate(catalogue.season_duration());
        self.add_deposit(id, ResourceDeposit::new(item, amount, def.max_amount, rate));
    }

    pub fn regrow(&mut self, delta_time: f32) {
        for cell in &mut self.cells {
            for deposit in &mut cell.deposits {
                deposit.regrow(delta_time);
            }
        }
    }

    pub fn cell_at(&self, col: u32, row: u32) -> Option<CellId> {
        (col < self.width && row < self.height).then(|| CellId(row * self.width + col))
    }

    fn axial(&self, id: CellId) -> (i32, i32) {
        let col = (id.0 % self.width.max(1)) as i32;
        let row = (id.0 / self.width.max(1)) as i32;
        (col - (row - (row & 1)) / 2, row)
    }

    fn from_axial(&self, q: i32, r: i32) -> Option<CellId> {
        if r < 0 {
            return None;
        }
        let col = q + (r - (r & 1)) / 2;
        if col < 0 {
            return None;
        }
        self.cell_at(col as u32, r as u32)
    }
}

impl Terrain for HexMap {
    fn neighbors(&self, cell: CellId) -> Vec<CellId> {
        if self.cell(cell).is_none() {
            return Vec::new();
        }
        let (q, r) = self.axial(cell);
        HEX_DIRECTIONS
            .iter()
            .filter_map(|(dq, dr)| self.from_axial(q + dq, r + dr))
            .collect()
    }

    fn deposits(&self, cell: CellId) -> &[ResourceDeposit] {
        self.cell(cell).map_or(&[], |c| c.deposits.as_slice())
    }

    fn distance(&self, a: CellId, b: CellId) -> u32 {
        let (aq, ar) = self.axial(a);
        let (bq, br) = self.axial(b);
        let dq = aq - bq;
        let dr = ar - br;
        ((dq.abs() + dr.abs() + (dq + dr).abs()) / 2) as u32
    }

    fn time_cost(
        &self,
        origin: CellId,
        destination: CellId,
        speed_multipliers: &[f32; VehicleKind::COUNT],
    ) -> Option<f32> {
        let from = self.cell(origin)?;
        let to = self.cell(destination)?;
        let speed = if to.ground == Ground::Water {
            // Water is only crossable with a boat
            let water = speed_multipliers[VehicleKind::Water.index()];
            if water <= 1.0 {
                return None;
            }
            water
        } else {
            speed_multipliers[VehicleKind::Land.index()]
                .max(speed_multipliers[VehicleKind::Air.index()])
        };
        let steps = self.distance(origin, destination) as f32;
        let mean_cost = (from.ground.move_cost() + to.ground.move_cost()) / 2.0;
        Some(steps * mean_cost / speed.max(f32::EPSILON))
    }
}
