//! Internal optimization utilities for smile calibration.

/// Configuration for the Nelder-Mead simplex optimizer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NelderMeadConfig {
    /// Maximum number of iterations per run.
    pub max_iter: usize,
    /// Convergence threshold on simplex diameter.
    pub diameter_tol: f64,
    /// Convergence threshold on objective value spread.
    pub fvalue_tol: f64,
}

/// Result of a Nelder-Mead optimization.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NelderMeadResult<const N: usize> {
    /// Best vertex found.
    pub x: [f64; N],
    /// Objective value at `x`.
    pub fval: f64,
    /// Iterations used.
    pub iterations: usize,
    /// Whether a tolerance was met before `max_iter`.
    pub converged: bool,
}

/// Box constraints `lower[i] ≤ x[i] ≤ upper[i]`. Use infinities for open sides.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bounds<const N: usize> {
    pub lower: [f64; N],
    pub upper: [f64; N],
}

impl<const N: usize> Bounds<N> {
    fn project(&self, mut x: [f64; N]) -> [f64; N] {
        for (i, xi) in x.iter_mut().enumerate() {
            *xi = xi.clamp(self.lower[i], self.upper[i]);
        }
        x
    }
}

/// Minimize `objective` over the box `bounds` with the Nelder-Mead simplex method.
///
/// Starts from `x0` with per-coordinate perturbations `steps` forming the
/// initial simplex. Every trial vertex is projected onto the box before
/// evaluation, so the objective never sees an out-of-bounds point.
pub(crate) fn nelder_mead<const N: usize, F>(
    objective: F,
    x0: [f64; N],
    steps: [f64; N],
    bounds: &Bounds<N>,
    config: &NelderMeadConfig,
) -> NelderMeadResult<N>
where
    F: Fn(&[f64; N]) -> f64,
{
    let eval = |x: &[f64; N]| {
        let f = objective(x);
        if f.is_nan() {
            f64::MAX
        } else {
            f
        }
    };

    let start = bounds.project(x0);
    let mut simplex: Vec<([f64; N], f64)> = Vec::with_capacity(N + 1);
    simplex.push((start, eval(&start)));
    for i in 0..N {
        let mut v = start;
        v[i] += steps[i];
        // Step back inward if the perturbation left the box
        if v[i] > bounds.upper[i] {
            v[i] = start[i] - steps[i];
        }
        let v = bounds.project(v);
        simplex.push((v, eval(&v)));
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let diameter = simplex
            .iter()
            .flat_map(|a| simplex.iter().map(move |b| distance(&a.0, &b.0)))
            .fold(0.0_f64, f64::max);
        let f_spread = simplex[N].1 - simplex[0].1;
        if diameter < config.diameter_tol || f_spread < config.fvalue_tol {
            converged = true;
            break;
        }
        iterations += 1;

        // Centroid of all but the worst vertex
        let mut centroid = [0.0; N];
        for (v, _) in &simplex[..N] {
            for (c, x) in centroid.iter_mut().zip(v) {
                *c += x / N as f64;
            }
        }

        let worst = simplex[N];
        let along = |t: f64, toward: &[f64; N]| {
            let mut p = [0.0; N];
            for i in 0..N {
                p[i] = centroid[i] + t * (toward[i] - centroid[i]);
            }
            bounds.project(p)
        };

        // Reflection
        let xr = along(-1.0, &worst.0);
        let fr = eval(&xr);

        if fr < simplex[N - 1].1 && fr >= simplex[0].1 {
            simplex[N] = (xr, fr);
        } else if fr < simplex[0].1 {
            // Expansion
            let xe = along(-2.0, &worst.0);
            let fe = eval(&xe);
            simplex[N] = if fe < fr { (xe, fe) } else { (xr, fr) };
        } else {
            // Contraction
            let xc = if fr < worst.1 {
                along(0.5, &xr)
            } else {
                along(0.5, &worst.0)
            };
            let fc = eval(&xc);
            if fc < worst.1.min(fr) {
                simplex[N] = (xc, fc);
            } else {
                // Shrink toward best vertex
                let best = simplex[0].0;
                for vertex in simplex.iter_mut().skip(1) {
                    let mut p = [0.0; N];
                    for i in 0..N {
                        p[i] = best[i] + 0.5 * (vertex.0[i] - best[i]);
                    }
                    let p = bounds.project(p);
                    *vertex = (p, eval(&p));
                }
            }
        }
    }

    let best = simplex
        .iter()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .copied()
        .unwrap_or((start, f64::MAX));

    NelderMeadResult {
        x: best.0,
        fval: best.1,
        iterations,
        converged,
    }
}

fn distance<const N: usize>(a: &[f64; N], b: &[f64; N]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
