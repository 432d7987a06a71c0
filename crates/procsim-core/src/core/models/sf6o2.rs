//! Silicon etching in an SF6/O2 plasma.
//!
//! Follows the surface kinetics of Belen et al., J. Vac. Sci. Technol. A 23, 99 (2005).
//! Three species are traced: energetic ions, fluorine etchant and oxygen. Fluorine and oxygen
//! compete for surface sites; the resulting coverages feed back into the sticking of both
//! neutrals. Etch rates are in micrometres per second and are returned as negative velocities.

use super::point_data::PointData;
use super::traits::{Particle, ProcessModel, Reflection, SurfaceHit, SurfaceModel};
use super::{ModelError, require_data, require_finite};
use crate::core::material::Material;
use crate::core::raytrace::RayRng;
use crate::core::raytrace::reflection::{coned_cosine, diffuse};
use crate::core::surface::SurfacePointCloud;
use rand::Rng;
use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::Arc;
use tracing::info;

pub const ION_SPUTTERING_RATE: &str = "ion_sputtering_rate";
pub const ION_ENHANCED_RATE: &str = "ion_enhanced_rate";
pub const OXYGEN_SPUTTERING_RATE: &str = "oxygen_sputtering_rate";
pub const ETCHANT_RATE: &str = "etchant_rate";
pub const OXYGEN_RATE: &str = "oxygen_rate";
pub const ETCHANT_COVERAGE: &str = "e_coverage";
pub const OXYGEN_COVERAGE: &str = "o_coverage";

/// Fluxes below this are treated as no flux when computing coverages.
const MIN_RATE: f64 = 1e-6;
const MAX_ENERGY_SAMPLES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskParameters {
    /// Density in 1e22 atoms/cm³.
    pub rho: f64,
    pub beta_f: f64,
    pub beta_o: f64,
    /// Sputtering threshold in eV.
    pub eth_sp: f64,
    pub a_sp: f64,
    pub b_sp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiParameters {
    /// Density in 1e22 atoms/cm³.
    pub rho: f64,
    pub eth_sp: f64,
    pub eth_ie: f64,
    pub a_sp: f64,
    pub b_sp: f64,
    pub a_ie: f64,
    /// Chemical etch rate constant in 1e15 cm⁻²s⁻¹.
    pub k_sigma: f64,
    /// Oxygen recombination rate in 1e15 cm⁻²s⁻¹.
    pub beta_sigma: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassivationParameters {
    pub eth_ie: f64,
    pub a_ie: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IonParameters {
    /// Mean ion energy in eV.
    pub mean_energy: f64,
    pub sigma_energy: f64,
    /// Exponent of the cosine source distribution.
    pub exponent: f64,
    pub inflect_angle: f64,
    pub n_l: f64,
    pub min_angle: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sf6O2Parameters {
    /// Fluxes in 1e15 /cm²/s.
    pub ion_flux: f64,
    pub etchant_flux: f64,
    pub oxygen_flux: f64,
    /// Etching stops once any surface point drops below this vertical coordinate.
    pub etch_stop_depth: f64,
    pub beta_f: f64,
    pub beta_o: f64,
    pub mask: MaskParameters,
    pub si: SiParameters,
    pub passivation: PassivationParameters,
    pub ions: IonParameters,
}

impl Default for Sf6O2Parameters {
    fn default() -> Self {
        Self {
            ion_flux: 12.0,
            etchant_flux: 1.8e3,
            oxygen_flux: 1.0e2,
            etch_stop_depth: f64::MIN,
            beta_f: 0.7,
            beta_o: 1.0,
            mask: MaskParameters {
                rho: 500.0,
                beta_f: 0.01,
                beta_o: 0.1,
                eth_sp: 20.0,
                a_sp: 0.0139,
                b_sp: 9.3,
            },
            si: SiParameters {
                rho: 5.02,
                eth_sp: 20.0,
                eth_ie: 4.0,
                a_sp: 0.0337,
                b_sp: 9.3,
                a_ie: 0.0361,
                k_sigma: 3.0e2,
                beta_sigma: 5.0e-2,
            },
            passivation: PassivationParameters {
                eth_ie: 4.0,
                a_ie: 0.0361,
            },
            ions: IonParameters {
                mean_energy: 100.0,
                sigma_energy: 10.0,
                exponent: 500.0,
                inflect_angle: 1.55334303,
                n_l: 10.0,
                min_angle: 1.3962634,
            },
        }
    }
}

impl Sf6O2Parameters {
    pub fn validate(&self) -> Result<(), ModelError> {
        for (name, value) in [
            ("ion_flux", self.ion_flux),
            ("etchant_flux", self.etchant_flux),
            ("oxygen_flux", self.oxygen_flux),
            ("beta_f", self.beta_f),
            ("beta_o", self.beta_o),
            ("ions.sigma_energy", self.ions.sigma_energy),
            ("ions.exponent", self.ions.exponent),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ModelError::InvalidParameter {
                    name,
                    reason: format!("must be non-negative, got {}", value),
                });
            }
        }
        for (name, value) in [
            ("mask.rho", self.mask.rho),
            ("si.rho", self.si.rho),
            ("ions.mean_energy", self.ions.mean_energy),
            ("ions.inflect_angle", self.ions.inflect_angle),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ModelError::InvalidParameter {
                    name,
                    reason: format!("must be positive, got {}", value),
                });
            }
        }
        require_finite("etch_stop_depth", self.etch_stop_depth)
    }

    fn sticking(&self, material: Material) -> (f64, f64) {
        if material == Material::Mask {
            (self.mask.beta_f, self.mask.beta_o)
        } else {
            (self.beta_f, self.beta_o)
        }
    }
}

/// SF6/O2 plasma etching of silicon with a mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Sf6O2Etching {
    params: Sf6O2Parameters,
}

impl Sf6O2Etching {
    pub fn new(params: Sf6O2Parameters) -> Result<Self, ModelError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Default material parameters with the commonly tuned plasma settings replaced.
    #[allow(clippy::too_many_arguments)]
    pub fn with_plasma(
        ion_flux: f64,
        etchant_flux: f64,
        oxygen_flux: f64,
        mean_energy: f64,
        sigma_energy: f64,
        ion_exponent: f64,
        oxygen_sputter_yield: f64,
        etch_stop_depth: f64,
    ) -> Result<Self, ModelError> {
        let mut params = Sf6O2Parameters {
            ion_flux,
            etchant_flux,
            oxygen_flux,
            etch_stop_depth,
            ..Default::default()
        };
        params.ions.mean_energy = mean_energy;
        params.ions.sigma_energy = sigma_energy;
        params.ions.exponent = ion_exponent;
        params.passivation.a_ie = oxygen_sputter_yield;
        Self::new(params)
    }

    pub fn parameters(&self) -> &Sf6O2Parameters {
        &self.params
    }

    pub fn process_model(&self) -> ProcessModel {
        let params = Arc::new(self.params);
        ProcessModel::new(
            "SF6O2Etching",
            Box::new(Sf6O2SurfaceModel {
                params: Arc::clone(&params),
                coverages: None,
            }),
        )
        .with_particle(Box::new(Ion::new(Arc::clone(&params))))
        .with_particle(Box::new(Etchant {
            params: Arc::clone(&params),
        }))
        .with_particle(Box::new(Oxygen { params }))
    }
}

#[derive(Debug, Clone)]
struct Sf6O2SurfaceModel {
    params: Arc<Sf6O2Parameters>,
    coverages: Option<PointData>,
}

impl SurfaceModel for Sf6O2SurfaceModel {
    fn initialize_coverages(&mut self, num_points: usize) {
        self.coverages = Some(PointData::zeros(
            &[ETCHANT_COVERAGE, OXYGEN_COVERAGE],
            num_points,
        ));
    }

    fn coverages(&self) -> Option<&PointData> {
        self.coverages.as_ref()
    }

    fn coverages_mut(&mut self) -> Option<&mut PointData> {
        self.coverages.as_mut()
    }

    fn update_coverages(
        &mut self,
        rates: &PointData,
        _materials: &[Material],
    ) -> Result<(), ModelError> {
        let n = rates.num_points();
        let etchant = require_data(rates, ETCHANT_RATE, n)?;
        let ion_enhanced = require_data(rates, ION_ENHANCED_RATE, n)?;
        let oxygen = require_data(rates, OXYGEN_RATE, n)?;
        let oxygen_sputtering = require_data(rates, OXYGEN_SPUTTERING_RATE, n)?;

        let p = &self.params;
        let mut e_coverage = vec![0.0; n];
        let mut o_coverage = vec![0.0; n];
        for i in 0..n {
            let fluorine = etchant[i] * p.etchant_flux * p.beta_f;
            let oxide = oxygen[i] * p.oxygen_flux * p.beta_o;
            let fluorine_loss = p.si.k_sigma + 2.0 * ion_enhanced[i] * p.ion_flux;
            let oxygen_loss = p.si.beta_sigma + oxygen_sputtering[i] * p.ion_flux;

            if etchant[i] >= MIN_RATE {
                e_coverage[i] =
                    fluorine / (fluorine + fluorine_loss * (1.0 + oxide / oxygen_loss));
            }
            if oxygen[i] >= MIN_RATE {
                o_coverage[i] = oxide / (oxide + oxygen_loss * (1.0 + fluorine / fluorine_loss));
            }
        }

        let coverages = self.coverages.get_or_insert_with(PointData::new);
        coverages.insert(ETCHANT_COVERAGE, e_coverage);
        coverages.insert(OXYGEN_COVERAGE, o_coverage);
        Ok(())
    }

    fn calculate_velocities(
        &mut self,
        rates: &PointData,
        surface: &SurfacePointCloud,
    ) -> Result<Vec<f64>, ModelError> {
        let n = surface.len();
        self.update_coverages(rates, &surface.materials())?;
        let ion_enhanced = require_data(rates, ION_ENHANCED_RATE, n)?;
        let ion_sputtering = require_data(rates, ION_SPUTTERING_RATE, n)?;
        let coverages = self
            .coverages
            .as_ref()
            .ok_or_else(|| ModelError::MissingData(ETCHANT_COVERAGE.to_string()))?;
        let e_coverage = require_data(coverages, ETCHANT_COVERAGE, n)?;

        let p = &self.params;
        let vertical = surface.dim() - 1;
        if surface
            .points()
            .iter()
            .any(|point| point.position[vertical] < p.etch_stop_depth)
        {
            info!(depth = p.etch_stop_depth, "Etch stop depth reached.");
            return Ok(vec![0.0; n]);
        }

        Ok(surface
            .points()
            .iter()
            .enumerate()
            .map(|(i, point)| {
                if point.material == Material::Mask {
                    -ion_sputtering[i] * p.ion_flux / p.mask.rho
                } else {
                    -(p.si.k_sigma * e_coverage[i] / 4.0
                        + ion_sputtering[i] * p.ion_flux
                        + e_coverage[i] * ion_enhanced[i] * p.ion_flux)
                        / p.si.rho
                }
            })
            .collect())
    }
}

/// Box-Muller transform.
fn sample_normal(rng: &mut RayRng, mean: f64, sigma: f64) -> f64 {
    let u1: f64 = 1.0 - rng.r#gen::<f64>();
    let u2: f64 = rng.r#gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    mean + sigma * z
}

/// Energetic ion. Sputters and enhances chemical etching on impact, and reflects near the
/// specular direction while losing energy.
#[derive(Debug, Clone)]
struct Ion {
    params: Arc<Sf6O2Parameters>,
    /// Peak of the reflected energy fraction at the inflection angle.
    a: f64,
    energy: f64,
}

impl Ion {
    fn new(params: Arc<Sf6O2Parameters>) -> Self {
        let ions = &params.ions;
        let a = 1.0 / (1.0 + ions.n_l * (FRAC_PI_2 / ions.inflect_angle - 1.0));
        let energy = ions.mean_energy;
        Self { params, a, energy }
    }

    fn reflected_energy_fraction(&self, incidence_angle: f64) -> f64 {
        let ions = &self.params.ions;
        if incidence_angle >= ions.inflect_angle {
            1.0 - (1.0 - self.a) * (FRAC_PI_2 - incidence_angle)
                / (FRAC_PI_2 - ions.inflect_angle)
        } else {
            self.a * (incidence_angle / ions.inflect_angle).powf(ions.n_l)
        }
    }
}

impl Particle for Ion {
    fn initialize_new(&mut self, rng: &mut RayRng) {
        let ions = &self.params.ions;
        for _ in 0..MAX_ENERGY_SAMPLES {
            let energy = sample_normal(rng, ions.mean_energy, ions.sigma_energy);
            if energy > 0.0 {
                self.energy = energy;
                return;
            }
        }
        self.energy = ions.mean_energy;
    }

    fn surface_collision(
        &mut self,
        weight: f64,
        hit: &SurfaceHit,
        local: &mut [Vec<f64>],
        _global: Option<&PointData>,
        _rng: &mut RayRng,
    ) {
        let p = &self.params;
        let cos_theta = hit.cos_incidence();
        let angle = cos_theta.acos();

        let f_ie = if cos_theta > 0.5 {
            1.0
        } else {
            3.0 - 6.0 * angle / PI
        };
        let (a_sp, b_sp, eth_sp) = if hit.material == Material::Mask {
            (p.mask.a_sp, p.mask.b_sp, p.mask.eth_sp)
        } else {
            (p.si.a_sp, p.si.b_sp, p.si.eth_sp)
        };
        let f_sp = (1.0 + b_sp * (1.0 - cos_theta * cos_theta)) * cos_theta;

        let sqrt_e = self.energy.sqrt();
        let sputtering = a_sp * (sqrt_e - eth_sp.sqrt()).max(0.0) * f_sp;
        let enhanced = p.si.a_ie * (sqrt_e - p.si.eth_ie.sqrt()).max(0.0) * f_ie;
        let oxygen_sputtering =
            p.passivation.a_ie * (sqrt_e - p.passivation.eth_ie.sqrt()).max(0.0) * f_ie;

        local[0][hit.disk] += weight * sputtering;
        local[1][hit.disk] += weight * enhanced;
        local[2][hit.disk] += weight * oxygen_sputtering;
    }

    fn surface_reflection(
        &mut self,
        _weight: f64,
        hit: &SurfaceHit,
        _global: Option<&PointData>,
        rng: &mut RayRng,
    ) -> Reflection {
        let incidence = hit.cos_incidence().acos();
        let peak = self.reflected_energy_fraction(incidence);

        let mut new_energy = None;
        for _ in 0..MAX_ENERGY_SAMPLES {
            let sample = sample_normal(rng, self.energy * peak, 0.1 * self.energy);
            if (0.0..=self.energy).contains(&sample) {
                new_energy = Some(sample);
                break;
            }
        }

        match new_energy {
            Some(energy) if energy > self.params.si.eth_ie => {
                self.energy = energy;
                let cone = FRAC_PI_2 - incidence.max(self.params.ions.min_angle);
                Reflection {
                    sticking: 0.0,
                    direction: coned_cosine(&hit.direction, &hit.normal, cone, hit.dim, rng),
                }
            }
            _ => Reflection::absorbed(),
        }
    }

    fn source_distribution_power(&self) -> f64 {
        self.params.ions.exponent
    }

    fn local_data_labels(&self) -> Vec<String> {
        vec![
            ION_SPUTTERING_RATE.to_string(),
            ION_ENHANCED_RATE.to_string(),
            OXYGEN_SPUTTERING_RATE.to_string(),
        ]
    }

    fn clone_box(&self) -> Box<dyn Particle> {
        Box::new(self.clone())
    }
}

/// Effective sticking of a neutral on the sites left free by both adsorbates.
fn free_site_sticking(beta: f64, disk: usize, global: Option<&PointData>) -> f64 {
    let coverage = |label: &str| {
        global
            .and_then(|g| g.get(label))
            .and_then(|values| values.get(disk).copied())
            .unwrap_or(0.0)
    };
    beta * (1.0 - coverage(ETCHANT_COVERAGE) - coverage(OXYGEN_COVERAGE)).max(0.0)
}

#[derive(Debug, Clone)]
struct Etchant {
    params: Arc<Sf6O2Parameters>,
}

impl Particle for Etchant {
    fn surface_collision(
        &mut self,
        weight: f64,
        hit: &SurfaceHit,
        local: &mut [Vec<f64>],
        _global: Option<&PointData>,
        _rng: &mut RayRng,
    ) {
        local[0][hit.disk] += weight;
    }

    fn surface_reflection(
        &mut self,
        _weight: f64,
        hit: &SurfaceHit,
        global: Option<&PointData>,
        rng: &mut RayRng,
    ) -> Reflection {
        let (beta, _) = self.params.sticking(hit.material);
        Reflection {
            sticking: free_site_sticking(beta, hit.disk, global),
            direction: diffuse(&hit.normal, hit.dim, rng),
        }
    }

    fn local_data_labels(&self) -> Vec<String> {
        vec![ETCHANT_RATE.to_string()]
    }

    fn clone_box(&self) -> Box<dyn Particle> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone)]
struct Oxygen {
    params: Arc<Sf6O2Parameters>,
}

impl Particle for Oxygen {
    fn surface_collision(
        &mut self,
        weight: f64,
        hit: &SurfaceHit,
        local: &mut [Vec<f64>],
        _global: Option<&PointData>,
        _rng: &mut RayRng,
    ) {
        local[0][hit.disk] += weight;
    }

    fn surface_reflection(
        &mut self,
        _weight: f64,
        hit: &SurfaceHit,
        global: Option<&PointData>,
        rng: &mut RayRng,
    ) -> Reflection {
        let (_, beta) = self.params.sticking(hit.material);
        Reflection {
            sticking: free_site_sticking(beta, hit.disk, global),
            direction: diffuse(&hit.normal, hit.dim, rng),
        }
    }

    fn local_data_labels(&self) -> Vec<String> {
        vec![OXYGEN_RATE.to_string()]
    }

    fn clone_box(&self) -> Box<dyn Particle> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::{BoundaryCondition, Grid};
    use crate::core::surface::SurfacePoint;
    use nalgebra::Vector3;
    use rand::SeedableRng;

    fn surface(points: &[(i64, Material)]) -> SurfacePointCloud {
        let grid = Grid::new(2, 0.1, [-10, -10, 0], [10, 10, 0], BoundaryCondition::Reflective)
            .unwrap();
        let points = points
            .iter()
            .enumerate()
            .map(|(i, &(height, material))| {
                let index = [i as i64, height, 0];
                SurfacePoint {
                    index,
                    position: grid.coordinate(&index),
                    normal: Vector3::y(),
                    material,
                }
            })
            .collect();
        SurfacePointCloud::new(points, &grid)
    }

    fn rates(values: [f64; 5], n: usize) -> PointData {
        let mut rates = PointData::new();
        for (label, value) in [
            ION_SPUTTERING_RATE,
            ION_ENHANCED_RATE,
            OXYGEN_SPUTTERING_RATE,
            ETCHANT_RATE,
            OXYGEN_RATE,
        ]
        .iter()
        .zip(values)
        {
            rates.insert(label, vec![value; n]);
        }
        rates
    }

    fn normal_hit(material: Material) -> SurfaceHit {
        SurfaceHit {
            disk: 0,
            direction: Vector3::new(0.0, -1.0, 0.0),
            normal: Vector3::y(),
            material,
            dim: 2,
        }
    }

    #[test]
    fn model_traces_three_species() {
        let model = Sf6O2Etching::new(Sf6O2Parameters::default())
            .unwrap()
            .process_model();
        assert_eq!(model.name(), "SF6O2Etching");
        assert_eq!(model.particles().len(), 3);
        assert_eq!(model.particles()[0].source_distribution_power(), 500.0);
        assert_eq!(model.particles()[0].local_data_labels().len(), 3);
    }

    #[test]
    fn coverages_vanish_without_neutral_flux() {
        let mut model = Sf6O2Etching::new(Sf6O2Parameters::default())
            .unwrap()
            .process_model();
        let surface_model = model.surface_model_mut();
        surface_model.initialize_coverages(2);
        surface_model
            .update_coverages(&rates([1.0, 1.0, 1.0, 0.0, 0.0], 2), &[])
            .unwrap();
        let coverages = surface_model.coverages().unwrap();
        assert_eq!(coverages.get(ETCHANT_COVERAGE), Some(&[0.0, 0.0][..]));
        assert_eq!(coverages.get(OXYGEN_COVERAGE), Some(&[0.0, 0.0][..]));
    }

    #[test]
    fn oxygen_competes_with_fluorine_for_sites() {
        let mut model = Sf6O2Etching::new(Sf6O2Parameters::default())
            .unwrap()
            .process_model();
        let surface_model = model.surface_model_mut();

        surface_model
            .update_coverages(&rates([0.1, 0.1, 0.1, 1.0, 0.0], 1), &[])
            .unwrap();
        let fluorine_alone = surface_model.coverages().unwrap().get(ETCHANT_COVERAGE).unwrap()[0];

        surface_model
            .update_coverages(&rates([0.1, 0.1, 0.1, 1.0, 1.0], 1), &[])
            .unwrap();
        let coverages = surface_model.coverages().unwrap();
        let fluorine = coverages.get(ETCHANT_COVERAGE).unwrap()[0];
        let oxygen = coverages.get(OXYGEN_COVERAGE).unwrap()[0];

        assert!(fluorine_alone > 0.0 && fluorine_alone < 1.0);
        assert!(fluorine < fluorine_alone);
        assert!(oxygen > 0.0 && fluorine + oxygen <= 1.0);
    }

    #[test]
    fn mask_is_only_sputtered() {
        let params = Sf6O2Parameters::default();
        let mut model = Sf6O2Etching::new(params).unwrap().process_model();
        let cloud = surface(&[(0, Material::Mask), (0, Material::Si)]);
        let v = model
            .surface_model_mut()
            .calculate_velocities(&rates([0.5, 0.2, 0.1, 1.0, 0.1], 2), &cloud)
            .unwrap();

        let expected_mask = -0.5 * params.ion_flux / params.mask.rho;
        assert!((v[0] - expected_mask).abs() < 1e-12);
        assert!(v[1] < expected_mask, "silicon etches faster than the mask");
    }

    #[test]
    fn etch_stop_depth_halts_all_points() {
        let params = Sf6O2Parameters {
            etch_stop_depth: -0.5,
            ..Default::default()
        };
        let mut model = Sf6O2Etching::new(params).unwrap().process_model();
        let cloud = surface(&[(0, Material::Si), (-6, Material::Si)]);
        let v = model
            .surface_model_mut()
            .calculate_velocities(&rates([0.5, 0.2, 0.1, 1.0, 0.1], 2), &cloud)
            .unwrap();
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn ion_yields_depend_on_energy_threshold() {
        let params = Arc::new(Sf6O2Parameters::default());
        let mut ion = Ion::new(params);
        let mut rng = RayRng::seed_from_u64(9);
        let hit = normal_hit(Material::Si);

        let mut local = vec![vec![0.0]; 3];
        ion.energy = 100.0;
        ion.surface_collision(1.0, &hit, &mut local, None, &mut rng);
        assert!(local.iter().all(|values| values[0] > 0.0));

        let mut low = vec![vec![0.0]; 3];
        ion.energy = 1.0;
        ion.surface_collision(1.0, &hit, &mut low, None, &mut rng);
        assert!(low.iter().all(|values| values[0] == 0.0));
    }

    #[test]
    fn mask_sputtering_uses_the_mask_yield() {
        let params = Sf6O2Parameters::default();
        let mut ion = Ion::new(Arc::new(params));
        let mut rng = RayRng::seed_from_u64(3);
        ion.energy = 100.0;

        let mut local = vec![vec![0.0]; 3];
        ion.surface_collision(1.0, &normal_hit(Material::Mask), &mut local, None, &mut rng);
        let expected = params.mask.a_sp * (10.0 - params.mask.eth_sp.sqrt());
        assert!((local[0][0] - expected).abs() < 1e-12);

        let mut on_si = vec![vec![0.0]; 3];
        ion.surface_collision(1.0, &normal_hit(Material::Si), &mut on_si, None, &mut rng);
        let expected_si = params.si.a_sp * (10.0 - params.si.eth_sp.sqrt());
        assert!((on_si[0][0] - expected_si).abs() < 1e-12);
    }

    #[test]
    fn slow_ions_at_normal_incidence_are_absorbed() {
        let mut ion = Ion::new(Arc::new(Sf6O2Parameters::default()));
        let mut rng = RayRng::seed_from_u64(4);
        ion.energy = 5.0;
        let reflection = ion.surface_reflection(1.0, &normal_hit(Material::Si), None, &mut rng);
        assert_eq!(reflection, Reflection::absorbed());
    }

    #[test]
    fn grazing_ions_reflect_and_keep_most_energy() {
        let mut ion = Ion::new(Arc::new(Sf6O2Parameters::default()));
        let mut rng = RayRng::seed_from_u64(4);
        ion.energy = 100.0;
        let hit = SurfaceHit {
            direction: Vector3::new(1.0, -0.02, 0.0).normalize(),
            ..normal_hit(Material::Si)
        };
        let reflection = ion.surface_reflection(1.0, &hit, None, &mut rng);
        assert_eq!(reflection.sticking, 0.0);
        assert!(reflection.direction.y > 0.0);
        assert!(ion.energy > 50.0 && ion.energy <= 100.0);
    }

    #[test]
    fn initial_ion_energy_is_positive() {
        let mut ion = Ion::new(Arc::new(Sf6O2Parameters::default()));
        let mut rng = RayRng::seed_from_u64(1);
        for _ in 0..100 {
            ion.initialize_new(&mut rng);
            assert!(ion.energy > 0.0);
        }
    }

    #[test]
    fn neutral_sticking_drops_with_coverage() {
        let params = Arc::new(Sf6O2Parameters::default());
        let mut etchant = Etchant {
            params: Arc::clone(&params),
        };
        let mut rng = RayRng::seed_from_u64(2);
        let hit = normal_hit(Material::Si);

        let bare = etchant.surface_reflection(1.0, &hit, None, &mut rng);
        assert!((bare.sticking - params.beta_f).abs() < 1e-12);

        let mut coverages = PointData::new();
        coverages.insert(ETCHANT_COVERAGE, vec![0.5]);
        coverages.insert(OXYGEN_COVERAGE, vec![0.25]);
        let covered = etchant.surface_reflection(1.0, &hit, Some(&coverages), &mut rng);
        assert!((covered.sticking - params.beta_f * 0.25).abs() < 1e-12);

        let mut oxygen = Oxygen { params };
        let on_mask = oxygen.surface_reflection(1.0, &normal_hit(Material::Mask), None, &mut rng);
        assert!((on_mask.sticking - 0.1).abs() < 1e-12);
    }

    #[test]
    fn rejects_negative_fluxes() {
        assert!(matches!(
            Sf6O2Etching::with_plasma(-1.0, 1.0, 1.0, 100.0, 10.0, 300.0, 2.0, f64::MIN),
            Err(ModelError::InvalidParameter { name: "ion_flux", .. })
        ));
    }
}
