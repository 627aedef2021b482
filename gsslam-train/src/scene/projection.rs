//! Camera matrices and screen-space projection of Gaussians
//!
//! Follows the conventions of tile-based Gaussian rasterizers: the view
//! matrix uses OpenCV axes (+Z forward, +Y down), the projection matrix maps
//! the frustum between [`NEAR_PLANE`] and [`FAR_PLANE`] to clip space, and the
//! image is split into square tiles of [`TILE_SIZE`] pixels.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};
use gsslam_data::{Camera, Gaussian};

pub const NEAR_PLANE: f32 = 0.001;
pub const FAR_PLANE: f32 = 1000.0;
pub const TILE_SIZE: u32 = 16;

/// Primitives closer than this in view space are culled.
const CLIP_THRESHOLD: f32 = 0.01;
/// Low-pass filter added to the 2D covariance diagonal.
const COV2D_BLUR: f32 = 0.3;
/// Off-screen primitives are clamped to 1.3x the field of view before the
/// Jacobian is evaluated.
const FRUSTUM_GUARD: f32 = 1.3;

/// World-to-camera matrix for `camera`.
///
/// The camera-to-world pose is converted from OpenGL to OpenCV axes by
/// flipping Y and Z, then inverted analytically (rotation transposed,
/// translation rotated and negated).
pub fn view_matrix(camera: &Camera) -> Mat4 {
    let rotation = camera.rotation * Mat3::from_diagonal(Vec3::new(1.0, -1.0, -1.0));
    let rotation_inv = rotation.transpose();
    let translation_inv = -(rotation_inv * camera.translation);
    Mat4::from_cols(
        rotation_inv.x_axis.extend(0.0),
        rotation_inv.y_axis.extend(0.0),
        rotation_inv.z_axis.extend(0.0),
        translation_inv.extend(1.0),
    )
}

/// Perspective projection with the given clip planes and fields of view.
pub fn projection_matrix(znear: f32, zfar: f32, fov_x: f32, fov_y: f32) -> Mat4 {
    let t = znear * (0.5 * fov_y).tan();
    let b = -t;
    let r = znear * (0.5 * fov_x).tan();
    let l = -r;
    let n = znear;
    let f = zfar;
    // Written row by row, glam stores columns.
    Mat4::from_cols(
        Vec4::new(2.0 * n / (r - l), 0.0, (r + l) / (r - l), 0.0),
        Vec4::new(0.0, 2.0 * n / (t - b), (t + b) / (t - b), 0.0),
        Vec4::new(0.0, 0.0, (f + n) / (f - n), -f * n / (f - n)),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
    )
    .transpose()
}

/// Tile grid covering an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub tile_size: u32,
}

impl TileGrid {
    pub fn for_image(width: u32, height: u32) -> Self {
        Self {
            tiles_x: width.div_ceil(TILE_SIZE),
            tiles_y: height.div_ceil(TILE_SIZE),
            tile_size: TILE_SIZE,
        }
    }
}

/// Everything a renderer needs to project primitives into one camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionRequest {
    pub view: Mat4,
    /// `projection * view`
    pub full_projection: Mat4,
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
    pub tiles: TileGrid,
}

impl ProjectionRequest {
    /// Build view, projection and tile grid for a camera at its current resolution.
    pub fn for_camera(camera: &Camera) -> Self {
        let view = view_matrix(camera);
        let projection = projection_matrix(NEAR_PLANE, FAR_PLANE, camera.fov_x(), camera.fov_y());
        let k = camera.intrinsics;
        Self {
            view,
            full_projection: projection * view,
            fx: k.fx,
            fy: k.fy,
            cx: k.cx,
            cy: k.cy,
            width: k.width,
            height: k.height,
            tiles: TileGrid::for_image(k.width, k.height),
        }
    }

    fn tan_fov(&self) -> Vec2 {
        Vec2::new(
            0.5 * self.width as f32 / self.fx,
            0.5 * self.height as f32 / self.fy,
        )
    }
}

/// Per-primitive projection results, indexed like the scene's primitives.
///
/// Culled primitives keep a zero radius and a zero depth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// Pixel-space centers.
    pub xys: Vec<Vec2>,
    /// View-space depth.
    pub depths: Vec<f32>,
    /// Screen radius in pixels; zero means not rasterized.
    pub radii: Vec<u32>,
    /// Inverse 2D covariance packed as (a, b, c) for `[[a, b], [b, c]]`.
    pub conics: Vec<Vec3>,
}

impl Projection {
    fn with_len(len: usize) -> Self {
        Self {
            xys: vec![Vec2::ZERO; len],
            depths: vec![0.0; len],
            radii: vec![0; len],
            conics: vec![Vec3::ZERO; len],
        }
    }

    pub fn len(&self) -> usize {
        self.radii.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }

    /// Indices of primitives with a positive screen radius.
    pub fn rasterized(&self) -> impl Iterator<Item = usize> + '_ {
        self.radii
            .iter()
            .enumerate()
            .filter(|(_, r)| **r > 0)
            .map(|(i, _)| i)
    }
}

/// Project every Gaussian into the camera described by `request`.
pub fn project_gaussians(gaussians: &[Gaussian], request: &ProjectionRequest) -> Projection {
    let mut out = Projection::with_len(gaussians.len());
    let view_rotation = Mat3::from_mat4(request.view);
    let tan_fov = request.tan_fov();

    for (i, g) in gaussians.iter().enumerate() {
        let p_view = (request.view * g.position.extend(1.0)).xyz();
        if p_view.z <= CLIP_THRESHOLD {
            continue;
        }

        let cov2d = project_covariance(g, p_view, view_rotation, request, tan_fov);
        let Some((conic, radius)) = cov2d_bounds(cov2d) else {
            continue;
        };

        let center = project_pixel(request, g.position);
        if tile_area(center, radius, &request.tiles) == 0 {
            continue;
        }

        out.xys[i] = center;
        out.depths[i] = p_view.z;
        out.radii[i] = radius;
        out.conics[i] = conic;
    }
    out
}

/// EWA splatting of the 3D covariance, returned as (a, b, c).
fn project_covariance(
    g: &Gaussian,
    p_view: Vec3,
    view_rotation: Mat3,
    request: &ProjectionRequest,
    tan_fov: Vec2,
) -> Vec3 {
    let lim = FRUSTUM_GUARD * tan_fov;
    let z = p_view.z;
    let x = z * (p_view.x / z).clamp(-lim.x, lim.x);
    let y = z * (p_view.y / z).clamp(-lim.y, lim.y);

    // Jacobian of the perspective divide; third row unused.
    let jacobian = Mat3::from_cols(
        Vec3::new(request.fx / z, 0.0, 0.0),
        Vec3::new(0.0, request.fy / z, 0.0),
        Vec3::new(-request.fx * x / (z * z), -request.fy * y / (z * z), 0.0),
    );
    let t = jacobian * view_rotation;
    let cov = t * g.covariance() * t.transpose();
    Vec3::new(cov.x_axis.x + COV2D_BLUR, cov.y_axis.x, cov.y_axis.y + COV2D_BLUR)
}

/// Conic and 3-sigma pixel radius, `None` for a singular covariance.
fn cov2d_bounds(cov: Vec3) -> Option<(Vec3, u32)> {
    let det = cov.x * cov.z - cov.y * cov.y;
    if det == 0.0 {
        return None;
    }
    let inv_det = 1.0 / det;
    let conic = Vec3::new(cov.z * inv_det, -cov.y * inv_det, cov.x * inv_det);

    let mid = 0.5 * (cov.x + cov.z);
    let spread = (mid * mid - det).max(0.1).sqrt();
    let lambda = (mid + spread).max(mid - spread);
    let radius = (3.0 * lambda.sqrt()).ceil();
    if !radius.is_finite() || radius <= 0.0 {
        return None;
    }
    Some((conic, radius as u32))
}

fn project_pixel(request: &ProjectionRequest, position: Vec3) -> Vec2 {
    let clip = request.full_projection * position.extend(1.0);
    let ndc = clip.xy() / (clip.w + 1e-6);
    Vec2::new(
        0.5 * request.width as f32 * ndc.x + request.cx - 0.5,
        0.5 * request.height as f32 * ndc.y + request.cy - 0.5,
    )
}

fn tile_area(center: Vec2, radius: u32, tiles: &TileGrid) -> u32 {
    let size = tiles.tile_size as f32;
    let tile_center = center / size;
    let tile_radius = radius as f32 / size;
    let clamp = |v: f32, max: u32| (v.max(0.0) as u32).min(max);

    let min_x = clamp(tile_center.x - tile_radius, tiles.tiles_x);
    let max_x = clamp(tile_center.x + tile_radius + 1.0, tiles.tiles_x);
    let min_y = clamp(tile_center.y - tile_radius, tiles.tiles_y);
    let max_y = clamp(tile_center.y + tile_radius + 1.0, tiles.tiles_y);
    (max_x - min_x) * (max_y - min_y)
}
