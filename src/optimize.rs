/*!
One-dimensional minimization
============================

Two classic derivative-free minimizers, both after Brent (1973): an
unconstrained one that first walks downhill from two starting points until it
has bracketed a minimum, and a bounded one that stays inside a closed
interval. The objectives minimized in this crate are step functions of the
scale factor, so neither minimizer can be expected to find a unique optimum;
they return the best point they saw, and report whether their own stopping
criterion was met.
 */

use serde_derive::Serialize;

/// Golden section ratio used when bracketing.
const GOLD: f64 = 1.618_034;
/// Golden section step used inside an interval, (3 - √5) / 2.
const CGOLD: f64 = 0.381_966_0;
const GROW_LIMIT: f64 = 110.0;
const VERY_SMALL: f64 = 1e-21;
const MIN_TOL: f64 = 1.0e-11;

/// Relative tolerance of the unbounded search, √(machine epsilon).
pub const BRENT_TOLERANCE: f64 = 1.48e-8;
/// Absolute tolerance in x of the bounded search.
pub const BOUNDED_TOLERANCE: f64 = 1e-5;
pub const MAX_ITERATIONS: usize = 500;
const MAX_BRACKET_ITERATIONS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Minimum {
    pub x: f64,
    pub fx: f64,
    pub evaluations: usize,
    /// Whether the search stopped on its tolerance rather than on an
    /// iteration limit or a failure to bracket.
    pub converged: bool,
}

struct Counted<F> {
    f: F,
    evaluations: usize,
}

impl<F: FnMut(f64) -> f64> Counted<F> {
    fn call(&mut self, x: f64) -> f64 {
        self.evaluations += 1;
        (self.f)(x)
    }
}

struct Bracket {
    xa: f64,
    xb: f64,
    xc: f64,
    fb: f64,
}

/// Walk downhill from `xa`, `xb` until `f(xb)` is no larger than the
/// function at the two outer points.
fn bracket<F: FnMut(f64) -> f64>(
    f: &mut Counted<F>,
    mut xa: f64,
    mut xb: f64,
) -> Result<Bracket, Bracket> {
    let mut fa = f.call(xa);
    let mut fb = f.call(xb);
    if fa < fb {
        std::mem::swap(&mut xa, &mut xb);
        std::mem::swap(&mut fa, &mut fb);
    }
    let mut xc = xb + GOLD * (xb - xa);
    let mut fc = f.call(xc);
    let mut iterations = 0;
    while fc < fb {
        let tmp1 = (xb - xa) * (fb - fc);
        let tmp2 = (xb - xc) * (fb - fa);
        let val = tmp2 - tmp1;
        let denom = if val.abs() < VERY_SMALL {
            2.0 * VERY_SMALL
        } else {
            2.0 * val
        };
        let mut w = xb - ((xb - xc) * tmp2 - (xb - xa) * tmp1) / denom;
        let wlim = xb + GROW_LIMIT * (xc - xb);
        if iterations > MAX_BRACKET_ITERATIONS {
            return Err(Bracket { xa, xb, xc, fb });
        }
        iterations += 1;
        let mut fw;
        if (w - xc) * (xb - w) > 0.0 {
            fw = f.call(w);
            if fw < fc {
                return Ok(Bracket {
                    xa: xb,
                    xb: w,
                    xc,
                    fb: fw,
                });
            } else if fw > fb {
                return Ok(Bracket { xa, xb, xc: w, fb });
            }
            w = xc + GOLD * (xc - xb);
            fw = f.call(w);
        } else if (w - wlim) * (wlim - xc) >= 0.0 {
            w = wlim;
            fw = f.call(w);
        } else if (w - wlim) * (xc - w) > 0.0 {
            fw = f.call(w);
            if fw < fc {
                xb = xc;
                xc = w;
                w = xc + GOLD * (xc - xb);
                fb = fc;
                fc = fw;
                fw = f.call(w);
            }
        } else {
            w = xc + GOLD * (xc - xb);
            fw = f.call(w);
        }
        xa = xb;
        xb = xc;
        xc = w;
        fa = fb;
        fb = fc;
        fc = fw;
    }
    Ok(Bracket { xa, xb, xc, fb })
}

/**
Minimize `f` without constraints, bracketing from the starting points 0 and 1.

```
use bruteabc::optimize::minimize_scalar;
use approx::assert_abs_diff_eq;

let m = minimize_scalar(|x| (x - 2.5).powi(2) + 1.0);
assert!(m.converged);
assert_abs_diff_eq!(m.x, 2.5, epsilon = 1e-6);
assert_abs_diff_eq!(m.fx, 1.0, epsilon = 1e-9);
```
 */
pub fn minimize_scalar<F: FnMut(f64) -> f64>(f: F) -> Minimum {
    let mut f = Counted { f, evaluations: 0 };
    let (bracket, bracketed) = match bracket(&mut f, 0.0, 1.0) {
        Ok(b) => (b, true),
        Err(b) => (b, false),
    };
    let (x, fx, converged) = brent(&mut f, bracket);
    Minimum {
        x,
        fx,
        evaluations: f.evaluations,
        converged: converged && bracketed,
    }
}

fn brent<F: FnMut(f64) -> f64>(f: &mut Counted<F>, bracket: Bracket) -> (f64, f64, bool) {
    let Bracket { xa, xb, xc, fb } = bracket;
    let (mut a, mut b) = if xa < xc { (xa, xc) } else { (xc, xa) };
    let (mut x, mut w, mut v) = (xb, xb, xb);
    let (mut fx, mut fw, mut fv) = (fb, fb, fb);
    let mut deltax: f64 = 0.0;
    let mut rat: f64 = 0.0;

    for _ in 0..MAX_ITERATIONS {
        let tol1 = BRENT_TOLERANCE * x.abs() + MIN_TOL;
        let tol2 = 2.0 * tol1;
        let xmid = 0.5 * (a + b);
        if (x - xmid).abs() < (tol2 - 0.5 * (b - a)) {
            return (x, fx, true);
        }
        if deltax.abs() <= tol1 {
            deltax = if x >= xmid { a - x } else { b - x };
            rat = CGOLD * deltax;
        } else {
            // Try a parabolic step through x, w and v.
            let tmp1 = (x - w) * (fx - fv);
            let mut tmp2 = (x - v) * (fx - fw);
            let mut p = (x - v) * tmp2 - (x - w) * tmp1;
            tmp2 = 2.0 * (tmp2 - tmp1);
            if tmp2 > 0.0 {
                p = -p;
            }
            tmp2 = tmp2.abs();
            let dx_temp = deltax;
            deltax = rat;
            if p > tmp2 * (a - x) && p < tmp2 * (b - x) && p.abs() < (0.5 * tmp2 * dx_temp).abs() {
                rat = p / tmp2;
                let u = x + rat;
                if (u - a) < tol2 || (b - u) < tol2 {
                    rat = if xmid - x >= 0.0 { tol1 } else { -tol1 };
                }
            } else {
                deltax = if x >= xmid { a - x } else { b - x };
                rat = CGOLD * deltax;
            }
        }

        let u = if rat.abs() < tol1 {
            if rat >= 0.0 {
                x + tol1
            } else {
                x - tol1
            }
        } else {
            x + rat
        };
        let fu = f.call(u);

        if fu > fx {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                w = u;
                fv = fw;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        } else {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            w = x;
            x = u;
            fv = fw;
            fw = fx;
            fx = fu;
        }
    }
    (x, fx, false)
}

/**
Minimize `f` over the closed interval `[lower, upper]`.

```
use bruteabc::optimize::minimize_bounded;
use approx::assert_abs_diff_eq;

let m = minimize_bounded(|x| (x - 3.0).powi(2), 0.0, 10.0);
assert_abs_diff_eq!(m.x, 3.0, epsilon = 1e-4);

// The minimum of an increasing function sits on the lower bound.
let m = minimize_bounded(|x| x, 0.0, 10.0);
assert!(m.x.abs() < 1e-3);
```
 */
pub fn minimize_bounded<F: FnMut(f64) -> f64>(f: F, lower: f64, upper: f64) -> Minimum {
    let mut f = Counted { f, evaluations: 0 };
    let sqrt_eps = f64::EPSILON.sqrt();
    let (mut a, mut b) = (lower, upper);

    let mut fulc = a + CGOLD * (b - a);
    let mut nfc = fulc;
    let mut xf = fulc;
    let mut rat: f64 = 0.0;
    let mut e: f64 = 0.0;
    let mut fx = f.call(xf);
    let mut ffulc = fx;
    let mut fnfc = fx;

    let mut xm = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * xf.abs() + BOUNDED_TOLERANCE / 3.0;
    let mut tol2 = 2.0 * tol1;
    let mut converged = true;

    while (xf - xm).abs() > (tol2 - 0.5 * (b - a)) {
        let mut golden = true;
        if e.abs() > tol1 {
            golden = false;
            let mut r = (xf - nfc) * (fx - ffulc);
            let mut q = (xf - fulc) * (fx - fnfc);
            let mut p = (xf - fulc) * q - (xf - nfc) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            r = e;
            e = rat;
            if p.abs() < (0.5 * q * r).abs() && p > q * (a - xf) && p < q * (b - xf) {
                rat = p / q;
                let x = xf + rat;
                if (x - a) < tol2 || (b - x) < tol2 {
                    rat = tol1 * sign_or_one(xm - xf);
                }
            } else {
                golden = true;
            }
        }
        if golden {
            e = if xf >= xm { a - xf } else { b - xf };
            rat = CGOLD * e;
        }

        let x = xf + sign_or_one(rat) * rat.abs().max(tol1);
        let fu = f.call(x);

        if fu <= fx {
            if x >= xf {
                a = xf;
            } else {
                b = xf;
            }
            fulc = nfc;
            ffulc = fnfc;
            nfc = xf;
            fnfc = fx;
            xf = x;
            fx = fu;
        } else {
            if x < xf {
                a = x;
            } else {
                b = x;
            }
            if fu <= fnfc || nfc == xf {
                fulc = nfc;
                ffulc = fnfc;
                nfc = x;
                fnfc = fu;
            } else if fu <= ffulc || fulc == xf || fulc == nfc {
                fulc = x;
                ffulc = fu;
            }
        }

        xm = 0.5 * (a + b);
        tol1 = sqrt_eps * xf.abs() + BOUNDED_TOLERANCE / 3.0;
        tol2 = 2.0 * tol1;

        if f.evaluations >= MAX_ITERATIONS {
            converged = false;
            break;
        }
    }

    Minimum {
        x: xf,
        fx,
        evaluations: f.evaluations,
        converged,
    }
}

/// The sign of `x`, counting zero as positive.
fn sign_or_one(x: f64) -> f64 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}
