use gpry_gp::{
    AppendOptions, GaussianProcessRegressor, GprParams, InfThreshold, NearestNeighborClassifier,
    NormalizeBounds, NormalizeY, PredictOptions,
};
use ndarray::{array, concatenate, Array, Array1, Array2, Axis};

/// Log-posterior of a narrow gaussian, very low away from its mode
fn log_posterior(x: &Array2<f64>) -> Array1<f64> {
    x.map_axis(Axis(1), |row| -0.5 * ((row[0] - 1.) / 0.3).powi(2))
}

fn main() -> Result<(), gpry_gp::GpError> {
    env_logger::init();

    let bounds = array![[-5., 5.]];
    let params = GprParams::new()
        .bounds(bounds.clone())
        .preprocessing_x(NormalizeBounds::new(&bounds)?)
        .preprocessing_y(NormalizeY::new())
        .infinities_classifier(NearestNeighborClassifier::new())
        .inf_threshold(Some(InfThreshold::Sigmas(5.)))
        .random_state(Some(42));
    let mut gpr = GaussianProcessRegressor::new(params)?;

    let mut x = array![[-4.], [-1.], [0.5], [2.], [4.5]];
    for iter in 0..6 {
        let y = log_posterior(&x);
        gpr.append_to_data(&x, &y, &AppendOptions::default())?;
        println!(
            "iter {iter}: {} finite / {} points, max = {:.3}",
            gpr.n(),
            gpr.n_total(),
            gpr.y_max()
        );

        // next point: highest upper confidence bound on a grid
        let grid = Array::linspace(-5., 5., 201).insert_axis(Axis(1));
        let opts = PredictOptions {
            return_std: true,
            ..Default::default()
        };
        let pred = gpr.predict(&grid, &opts)?;
        let std = pred.std.unwrap_or_else(|| Array1::zeros(grid.nrows()));
        let ucb = &pred.mean + &(std * 2.);
        let best = ucb
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc })
            .0;
        x = grid.select(Axis(0), &[best]);
    }

    let xtest = Array::linspace(-1., 3., 9).insert_axis(Axis(1));
    let ytest = log_posterior(&xtest);
    let ypred = gpr.predict(&xtest, &PredictOptions::default())?.mean;
    println!("x, true, predicted");
    println!(
        "{}",
        concatenate![
            Axis(1),
            xtest,
            ytest.insert_axis(Axis(1)),
            ypred.insert_axis(Axis(1))
        ]
    );
    Ok(())
}
