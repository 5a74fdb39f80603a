use crate::error::{Error, Result};
use nalgebra::{DMatrix, Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 3x3 projective (homography) pixel-to-world mapper. Invertible.
///
/// Grounded on the original system's `HomographyMapper`: a single 3x3 matrix
/// `H` transforms pixel coordinates to world coordinates via homogeneous
/// multiplication and division by the third component; `H^-1` does the
/// reverse. Both directions are supported, unlike the dense mapper.
#[derive(Debug, Clone)]
pub struct ProjectiveMapper {
    h: Matrix3<f64>,
    h_inv: Matrix3<f64>,
}

#[derive(Serialize, Deserialize)]
struct StoredHomography {
    /// Row-major 3x3 matrix.
    matrix: [[f64; 3]; 3],
}

impl ProjectiveMapper {
    pub fn from_matrix(h: Matrix3<f64>) -> Result<Self> {
        let h_inv = h.try_inverse().ok_or(Error::SingularHomography)?;
        Ok(Self { h, h_inv })
    }

    /// Direct linear transform (DLT) fit from four or more point
    /// correspondences, the Rust counterpart of
    /// `compute_and_save_homography`. Solves via the smallest right
    /// singular vector of the homogeneous constraint matrix.
    pub fn from_point_correspondences(
        src: &[(f64, f64)],
        dst: &[(f64, f64)],
    ) -> Result<Self> {
        if src.len() < 4 || dst.len() < 4 || src.len() != dst.len() {
            return Err(Error::TooFewCorrespondences {
                count: src.len().min(dst.len()),
            });
        }
        let n = src.len();
        let mut a = DMatrix::<f64>::zeros(2 * n, 9);
        for (i, (&(u, v), &(x, y))) in src.iter().zip(dst.iter()).enumerate() {
            let r0 = 2 * i;
            a.set_row(
                r0,
                &DMatrix::from_row_slice(1, 9, &[-u, -v, -1.0, 0.0, 0.0, 0.0, u * x, v * x, x])
                    .row(0),
            );
            a.set_row(
                r0 + 1,
                &DMatrix::from_row_slice(1, 9, &[0.0, 0.0, 0.0, -u, -v, -1.0, u * y, v * y, y])
                    .row(0),
            );
        }
        // The homogeneous least-squares solution is the eigenvector of
        // A^T*A with the smallest eigenvalue. A thin SVD of the (2n x 9,
        // 2n < 9 typically not, but rank-deficient-by-one) matrix A would
        // drop exactly the null-space vector we need, so go through the
        // normal equations instead.
        let ata = a.transpose() * &a;
        let eigen = nalgebra::linalg::SymmetricEigen::new(ata);
        let (min_idx, _) = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .ok_or(Error::SingularHomography)?;
        let h_vec = eigen.eigenvectors.column(min_idx).clone_owned();
        if h_vec.iter().all(|v| v.abs() < 1e-12) {
            return Err(Error::SingularHomography);
        }
        let h = Matrix3::new(
            h_vec[0], h_vec[1], h_vec[2], h_vec[3], h_vec[4], h_vec[5], h_vec[6], h_vec[7],
            h_vec[8],
        );
        Self::from_matrix(h)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut matrix = [[0.0; 3]; 3];
        for r in 0..3 {
            for c in 0..3 {
                matrix[r][c] = self.h[(r, c)];
            }
        }
        let stored = StoredHomography { matrix };
        let contents = serde_json::to_string_pretty(&stored)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let stored: StoredHomography = serde_json::from_str(&contents)?;
        let mut h = Matrix3::zeros();
        for r in 0..3 {
            for c in 0..3 {
                h[(r, c)] = stored.matrix[r][c];
            }
        }
        Self::from_matrix(h)
    }

    pub fn transform_point(&self, point: (f64, f64), inverse: bool) -> Result<(f64, f64)> {
        let h = if inverse { &self.h_inv } else { &self.h };
        let pt = Vector3::new(point.0, point.1, 1.0);
        let transformed = h * pt;
        if transformed.z.abs() < 1e-12 {
            return Err(Error::SingularHomography);
        }
        Ok((transformed.x / transformed.z, transformed.y / transformed.z))
    }

    pub fn transform_points(
        &self,
        points: &[(f64, f64)],
        inverse: bool,
    ) -> Result<Vec<(f64, f64)>> {
        points
            .iter()
            .map(|&p| self.transform_point(p, inverse))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_like_mapper() -> ProjectiveMapper {
        // Pure scale + translate: world = 2*pixel + (10, 20)
        let h = Matrix3::new(2.0, 0.0, 10.0, 0.0, 2.0, 20.0, 0.0, 0.0, 1.0);
        ProjectiveMapper::from_matrix(h).unwrap()
    }

    #[test]
    fn forward_transform_is_affine() {
        let m = identity_like_mapper();
        let (x, y) = m.transform_point((5.0, 5.0), false).unwrap();
        assert!((x - 20.0).abs() < 1e-9);
        assert!((y - 30.0).abs() < 1e-9);
    }

    // P8: round-trip projective invariant.
    #[test]
    fn round_trip_projective() {
        let m = identity_like_mapper();
        for p in [(0.0, 0.0), (100.0, 200.0), (-5.0, 37.5)] {
            let fwd = m.transform_point(p, false).unwrap();
            let back = m.transform_point(fwd, true).unwrap();
            assert!((back.0 - p.0).abs() < 1e-6);
            assert!((back.1 - p.1).abs() < 1e-6);
        }
    }

    #[test]
    fn fit_from_correspondences_recovers_known_homography() {
        let truth = identity_like_mapper();
        let src = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let dst: Vec<(f64, f64)> = src
            .iter()
            .map(|&p| truth.transform_point(p, false).unwrap())
            .collect();
        let fit = ProjectiveMapper::from_point_correspondences(&src, &dst).unwrap();
        for p in src {
            let expect = truth.transform_point(p, false).unwrap();
            let got = fit.transform_point(p, false).unwrap();
            assert!((expect.0 - got.0).abs() < 1e-6);
            assert!((expect.1 - got.1).abs() < 1e-6);
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let m = identity_like_mapper();
        let path = std::env::temp_dir().join(format!("mcmot-geom-test-{}.json", std::process::id()));
        m.save(&path).unwrap();
        let loaded = ProjectiveMapper::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let (x, y) = loaded.transform_point((5.0, 5.0), false).unwrap();
        assert!((x - 20.0).abs() < 1e-9);
        assert!((y - 30.0).abs() < 1e-9);
    }
}
