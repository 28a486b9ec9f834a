use crate::{
    context::{Context, DataPlugin},
    hashing::{hash_str, hash_value},
    log::trace,
    PersonId,
};
use rand::SeedableRng;
use std::any::Any;

/// A named source of randomness. Declare one per purpose with `define_rng!` so that adding
/// draws for one purpose never perturbs the generators of another.
pub trait RngId: Any {
    #![allow(non_upper_case_globals)]
    const name: &'static str;
    type RngType: SeedableRng;
}

struct RngPlugin {
    base_seed: u64,
}

impl DataPlugin for RngPlugin {
    #[allow(non_upper_case_globals)]
    const new: &'static dyn Fn() -> Self = &|| RngPlugin { base_seed: 0 };
}

/// Derives an independent generator for one person in one simulated year.
///
/// The seed depends only on the base seed, the generator's name, the year and the person,
/// so draws are identical however the population is split across workers.
pub fn derive_rng<R: RngId>(base_seed: u64, year: u32, person_id: PersonId) -> R::RngType {
    let seed = base_seed
        .wrapping_add(hash_str(R::name))
        .wrapping_add(hash_value(&(year, person_id.0)));
    <R::RngType as SeedableRng>::seed_from_u64(seed)
}

pub trait ContextRandomExt {
    fn init_random(&mut self, base_seed: u64);

    /// The seed given to `init_random`, or 0 if it was never called.
    fn get_base_random_seed(&self) -> u64;
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random module with seed {base_seed}");
        self.get_data_container_mut::<RngPlugin>().base_seed = base_seed;
    }

    fn get_base_random_seed(&self) -> u64 {
        self.get_data_container::<RngPlugin>()
            .map_or(0, |rng_container| rng_container.base_seed)
    }
}

#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        pub(crate) struct $random_id;

        impl $crate::random::RngId for $random_id {
            #![allow(non_upper_case_globals)]
            type RngType = $crate::rand::rngs::StdRng;
            const name: &'static str = stringify!($random_id);
        }
    };
}
