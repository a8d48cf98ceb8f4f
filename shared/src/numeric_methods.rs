use ndarray::{
    Array1,
    Array2,
    ArrayView1,
    ArrayView2,
    Axis,
    s,
};
use ndrustfft::{ndfft, FftHandler};
use rayon::prelude::*;

use crate::{
    c64,
    bail,
    Result,
};


/// Calculate the frequencies for generic FFT.
pub fn fft_freq_1d<R>(n: usize, dx: f64) -> R
where R: FromIterator<f64>
{
    let n = n as i64;

    let positive_end = (n - 1) / 2;
    let negative_beg = -(n / 2);

    (0 ..= positive_end).chain(negative_beg ..= -1)
        .map(|x| x as f64 / (dx * n as f64))
        .collect()
}


/// Forward discrete Fourier transform, `X[k] = SUM(x[j] * exp(-2 pi i j k / n))`.
pub fn fft_1d(xs: ArrayView1<c64>) -> Array1<c64> {
    let n = xs.len();
    let mut ret = Array1::<c64>::zeros(n);
    if n == 0 {
        return ret;
    }
    let mut handler = FftHandler::<f64>::new(n);
    ndfft(&xs, &mut ret, &mut handler, 0);
    ret
}


/// Inverse discrete Fourier transform normalized by `1/n`, same convention as `numpy.fft.ifft`.
pub fn ifft_1d(xs: ArrayView1<c64>) -> Array1<c64> {
    let n = xs.len();
    if n == 0 {
        return Array1::zeros(0);
    }
    let conj = xs.mapv(|x| x.conj());
    fft_1d(conj.view()).mapv(|x| x.conj() / n as f64)
}


/// Move the zero-frequency component to the center, same as `numpy.fft.fftshift`.
pub fn fftshift<T: Clone>(xs: ArrayView1<T>) -> Array1<T> {
    let n = xs.len();
    let shift = n / 2;
    (0 .. n).map(|i| xs[(i + n - shift) % n].clone()).collect()
}


/// Inverse of [`fftshift`], same as `numpy.fft.ifftshift`.
pub fn ifftshift<T: Clone>(xs: ArrayView1<T>) -> Array1<T> {
    let n = xs.len();
    let shift = n / 2;
    (0 .. n).map(|i| xs[(i + shift) % n].clone()).collect()
}


/// Time correlation of a complex signal evaluated with a zero-padded FFT.
///
/// `y[t] = SUM(conj(x[k]) * x[k+t]) / (n - t)` for `k` in `0 .. n-t`.
pub fn complex_correlation(xs: ArrayView1<c64>) -> Array1<c64> {
    let n = xs.len();
    if n == 0 {
        return Array1::zeros(0);
    }

    let mut padded = Array1::<c64>::zeros(2 * n);
    padded.slice_mut(s![.. n]).assign(&xs);

    let fx = fft_1d(padded.view());
    let power = fx.mapv(|v| v.conj() * v);
    let corr = ifft_1d(power.view());

    (0 .. n).map(|t| corr[t] / (n - t) as f64).collect()
}


/// Correlate every column of `series` (`[nframes, ncols]`) and average the real
/// parts over the columns.
pub fn average_correlation(series: ArrayView2<c64>) -> Array1<f64> {
    let (nframes, ncols) = series.dim();
    if ncols == 0 {
        return Array1::zeros(nframes);
    }

    let columns = (0 .. ncols).into_par_iter()
        .map(|icol| complex_correlation(series.column(icol)).mapv(|v| v.re))
        .collect::<Vec<_>>();

    let mut ret = Array1::<f64>::zeros(nframes);
    for c in columns.iter() {
        ret += c;
    }
    ret / ncols as f64
}


/// Mean square displacement of a 1D coordinate series using the FFT correlation.
///
/// `msd[t] = SUM((x[k+t] - x[k])^2) / (n - t)`
pub fn msd_1d(xs: ArrayView1<f64>) -> Array1<f64> {
    let n = xs.len();
    if n == 0 {
        return Array1::zeros(0);
    }

    let d = xs.mapv(|x| x * x);
    let mut q = 2.0 * d.sum();
    let mut s1 = Array1::<f64>::zeros(n);
    for m in 0 .. n {
        if m > 0 {
            q -= d[m - 1] + d[n - m];
        }
        s1[m] = q / (n - m) as f64;
    }

    let s2 = complex_correlation(xs.mapv(|x| c64::new(x, 0.0)).view()).mapv(|v| v.re);
    s1 - s2 * 2.0
}


/// Mirror a one-sided time signal, giving `[x[n-1], ..., x[1], x[0], x[1], ..., x[n-1]]`.
pub fn symmetrize(xs: ArrayView1<f64>) -> Array1<f64> {
    let n = xs.len();
    if n == 0 {
        return Array1::zeros(0);
    }
    xs.slice(s![1 ..; -1]).iter()
        .chain(xs.iter())
        .cloned()
        .collect()
}


/// Spectrum of a one-sided time signal: the signal is symmetrized, multiplied by
/// `window` (length `2n-1`) and Fourier transformed, the zero frequency lands in the
/// center of the result.
pub fn get_spectrum(signal: ArrayView1<f64>, window: ArrayView1<f64>, dt: f64) -> Result<Array1<f64>> {
    let s = symmetrize(signal);
    if s.len() != window.len() {
        bail!("[SPECTRUM]: window has {} points, expected {} for a signal of {} points.",
              window.len(), s.len(), signal.len());
    }

    let s = (s * &window).mapv(|v| c64::new(v, 0.0));
    let s = ifftshift(s.view());
    let s = fft_1d(s.view());
    let s = fftshift(s.view());

    Ok(s.mapv(|v| v.re * 0.5 * dt / std::f64::consts::PI))
}


/// Apply [`get_spectrum`] on each row of `signal`.
pub fn get_spectrum_rows(signal: ArrayView2<f64>, window: ArrayView1<f64>, dt: f64) -> Result<Array2<f64>> {
    let (nrows, _) = signal.dim();
    let mut ret = Array2::<f64>::zeros((nrows, window.len()));
    for (mut dst, src) in ret.axis_iter_mut(Axis(0)).zip(signal.axis_iter(Axis(0))) {
        dst.assign(&get_spectrum(src, window, dt)?);
    }
    Ok(ret)
}


#[cfg(test)]
mod tests{
    use super::*;
    use ndarray::array;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1E-9
    }


    #[test]
    fn test_fft_freq() {
        let freq: Vec<f64> = fft_freq_1d(4, 0.5);
        assert_eq!(freq, vec![0.0, 0.5, -1.0, -0.5]);

        let freq: Vec<f64> = fft_freq_1d(5, 0.5);
        assert_eq!(freq[1],  0.4);
        assert_eq!(freq[2],  0.8);
        assert_eq!(freq[3], -0.8);
        assert_eq!(freq.len(), 5);
    }


    #[test]
    fn test_fft_ifft() {
        let xs = array![c64::new(1.0, 0.0), c64::new(2.0, -1.0), c64::new(0.0, 3.0)];
        let fx = fft_1d(xs.view());
        assert!(close(fx[0].re, 3.0) && close(fx[0].im, 2.0));
        let back = ifft_1d(fx.view());
        for (a, b) in back.iter().zip(xs.iter()) {
            assert!(close(a.re, b.re) && close(a.im, b.im));
        }
    }


    #[test]
    fn test_shift() {
        let xs = array![0, 1, 2, -2, -1];
        assert_eq!(fftshift(xs.view()), array![-2, -1, 0, 1, 2]);
        assert_eq!(ifftshift(fftshift(xs.view()).view()), xs);

        let xs = array![0, 1, -2, -1];
        assert_eq!(fftshift(xs.view()), array![-2, -1, 0, 1]);
    }


    #[test]
    fn test_complex_correlation() {
        let xs = array![c64::new(1.0, 0.5), c64::new(-0.3, 2.0), c64::new(0.7, -1.1), c64::new(0.2, 0.0)];
        let n = xs.len();
        let ys = complex_correlation(xs.view());

        for t in 0 .. n {
            let expect = (0 .. n-t).map(|k| xs[k].conj() * xs[k + t]).sum::<c64>() / (n - t) as f64;
            assert!(close(ys[t].re, expect.re), "t = {t}");
            assert!(close(ys[t].im, expect.im), "t = {t}");
        }
    }


    #[test]
    fn test_msd_1d() {
        let xs = array![0.0, 1.0, 2.0, 3.0, 4.0];
        let msd = msd_1d(xs.view());
        for t in 0 .. 5 {
            assert!(close(msd[t], (t * t) as f64), "t = {t}, msd = {}", msd[t]);
        }
    }


    #[test]
    fn test_symmetrize() {
        let xs = array![1.0, 2.0, 3.0];
        assert_eq!(symmetrize(xs.view()), array![3.0, 2.0, 1.0, 2.0, 3.0]);
    }


    #[test]
    fn test_spectrum_of_constant() {
        // A constant correlation gives a spike at the zero frequency.
        let signal = Array1::<f64>::ones(3);
        let window = Array1::<f64>::ones(5);
        let spec = get_spectrum(signal.view(), window.view(), 1.0).unwrap();
        assert!(close(spec[2], 5.0 * 0.5 / std::f64::consts::PI));
        assert!(close(spec[0], 0.0));
        assert!(close(spec[4], 0.0));

        assert!(get_spectrum(signal.view(), Array1::<f64>::ones(4).view(), 1.0).is_err());
        assert!(get_spectrum_rows(Array2::<f64>::ones((2, 3)).view(), window.view(), 1.0).is_ok());
    }
}
