/// Values used for parameters that neither the file nor the command line set.
pub struct DefaultsConfig {
    pub dimension: usize,
    pub taper_angle: f64,
    pub base_height: f64,
    pub periodic_boundary: bool,
    pub reaction_order: f64,
    pub num_rays_per_point: usize,
    pub random_seed: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            dimension: 2,
            taper_angle: 0.0,
            base_height: 0.0,
            periodic_boundary: false,
            reaction_order: 1.0,
            num_rays_per_point: 1000,
            random_seed: 0,
        }
    }
}
