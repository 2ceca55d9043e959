//! Standard filter set.
//!
//! | name | kind |
//! |---|---|
//! | `white_balance` | transform |
//! | `laplacian_variance` | measurement |
//! | `richard_lucy_deconvolution` | transform |
//! | `adaptive_histograph_equalisation` | transform |
//! | `super_res_upscale` | transform |

pub mod clahe;
pub mod deconvolution;
pub mod laplacian;
pub mod plane;
pub mod upscale;
pub mod white_balance;

pub use clahe::ClaheFilter;
pub use deconvolution::{DeconvolutionParams, RichardsonLucyFilter};
pub use laplacian::LaplacianVarianceFilter;
pub use upscale::UpscaleFilter;
pub use white_balance::WhiteBalanceFilter;
