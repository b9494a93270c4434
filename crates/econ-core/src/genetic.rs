//! Genetic Algorithm
//!
//! Generic optimizer over fixed-length gene vectors: elitism, roulette-wheel
//! parent choice, uniform crossover and per-gene mutation. Not wired into
//! the agent loop; planners may use it as an alternative search.

use rand::{Rng, RngCore};

use crate::config::GeneticConfig;
use crate::random::weighted_index;

/// One candidate solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Dna<T> {
    pub genes: Vec<T>,
    pub fitness: f32,
}

impl<T: Clone> Dna<T> {
    pub fn random(size: usize, rng: &mut dyn RngCore, gene: &mut impl FnMut(&mut dyn RngCore) -> T) -> Self {
        Self {
            genes: (0..size).map(|_| gene(&mut *rng)).collect(),
            fitness: 0.0,
        }
    }

    /// Each gene comes from either parent with equal chance.
    pub fn crossover(&self, other: &Dna<T>, rng: &mut dyn RngCore) -> Dna<T> {
        let genes = self
            .genes
            .iter()
            .zip(&other.genes)
            .map(|(a, b)| if rng.gen::<bool>() { a.clone() } else { b.clone() })
            .collect();
        Dna { genes, fitness: 0.0 }
    }

    pub fn mutate(&mut self, rate: f32, rng: &mut dyn RngCore, gene: &mut impl FnMut(&mut dyn RngCore) -> T) {
        for slot in &mut self.genes {
            if rng.gen::<f32>() < rate {
                *slot = gene(&mut *rng);
            }
        }
    }
}

pub struct GeneticAlgorithm<T, G, F>
where
    G: FnMut(&mut dyn RngCore) -> T,
    F: FnMut(usize, &[T]) -> f32,
{
    population: Vec<Dna<T>>,
    dna_size: usize,
    elite: usize,
    mutation_rate: f32,
    generation: u32,
    /// Negative infinity until the first generation is scored
    best_fitness: f32,
    best_genes: Vec<T>,
    gene: G,
    fitness: F,
}

impl<T, G, F> GeneticAlgorithm<T, G, F>
where
    T: Clone,
    G: FnMut(&mut dyn RngCore) -> T,
    F: FnMut(usize, &[T]) -> f32,
{
    pub fn new(
        population_size: usize,
        dna_size: usize,
        elite: usize,
        mutation_rate: f32,
        rng: &mut dyn RngCore,
        mut gene: G,
        fitness: F,
    ) -> Self {
        let population = (0..population_size)
            .map(|_| Dna::random(dna_size, &mut *rng, &mut gene))
            .collect();
        Self {
            population,
            dna_size,
            elite,
            mutation_rate,
            generation: 1,
            best_fitness: f32::NEG_INFINITY,
            best_genes: Vec::new(),
            gene,
            fitness,
        }
    }

    pub fn from_config(config: &GeneticConfig, dna_size: usize, rng: &mut dyn RngCore, gene: G, fitness: F) -> Self {
        Self::new(
            config.population_size,
            dna_size,
            config.elite,
            config.mutation_rate,
            rng,
            gene,
            fitness,
        )
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn best_fitness(&self) -> f32 {
        self.best_fitness
    }

    pub fn best_genes(&self) -> &[T] {
        &self.best_genes
    }

    pub fn population(&self) -> &[Dna<T>] {
        &self.population
    }

    /// Scores, ranks and replaces the population.
    ///
    /// The next population has `extra` more members than this one. Extra
    /// members are crossover children when `crossover_extra` is set and
    /// fresh random members otherwise.
    pub fn new_generation(&mut self, rng: &mut dyn RngCore, extra: usize, crossover_extra: bool) {
        let current = self.population.len();
        if current + extra == 0 {
            return;
        }
        if current > 0 {
            self.score();
            self.population
                .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        }

        let weights: Vec<f32> = self.population.iter().map(|d| d.fitness.max(0.0)).collect();
        let mut next = Vec::with_capacity(current + extra);
        for i in 0..current + extra {
            if i < self.elite && i < current {
                next.push(self.population[i].clone());
            } else if current > 0 && (i < current || crossover_extra) {
                let a = choose_parent(&weights, rng);
                let b = choose_parent(&weights, rng);
                let mut child = self.population[a].crossover(&self.population[b], rng);
                child.mutate(self.mutation_rate, rng, &mut self.gene);
                next.push(child);
            } else {
                next.push(Dna::random(self.dna_size, rng, &mut self.gene));
            }
        }

        self.population = next;
        self.generation += 1;
    }

    fn score(&mut self) {
        for (i, dna) in self.population.iter_mut().enumerate() {
            dna.fitness = (self.fitness)(i, &dna.genes);
            if dna.fitness > self.best_fitness {
                self.best_fitness = dna.fitness;
                self.best_genes = dna.genes.clone();
            }
        }
    }
}

/// Roulette wheel; negative fitness has no weight and a zero total falls
/// back to a uniform choice.
fn choose_parent(weights: &[f32], rng: &mut dyn RngCore) -> usize {
    weighted_index(rng, weights).unwrap_or_else(|| rng.gen_range(0..weights.len().max(1)))
}
